pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod provider;

pub use config::{load_settings, load_settings_from_str, Settings};
pub use db::{Database, DatabaseError};
pub use error::{AiContentError, ConfigError, Result};
pub use jobs::{
    ContentType, Job, JobQuery, JobStatus, JobStore, JobTracker, StoreError, SubmitOutcome,
    TrackerError, TrackerSettings,
};
pub use logging::LoggingError;
pub use pipeline::{
    full_content_pipeline, ContentSpec, Pipeline, PipelineDefinition, PipelineError,
    PipelineResult, Stage,
};
pub use provider::{
    GenerationErrorKind, GenerationProvider, GenerationRequest, GenerationResult,
    ProviderRegistry,
};

/// Opens the job database named by `settings` and wires the tracker
/// with the given providers.
pub fn open_tracker(settings: &Settings, providers: ProviderRegistry) -> Result<JobTracker> {
    let db = Database::open(&settings.database_path())?;
    Ok(JobTracker::new(
        JobStore::new(db),
        providers,
        settings.tracker_settings(),
    ))
}
