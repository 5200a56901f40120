//! Pipeline Orchestrator: composes provider calls, media merges and
//! uploads into named multi-stage workflows.

pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod media;
pub mod progress;
pub mod result;
pub mod runner;
pub mod stage;

pub use config::PipelineSettings;
pub use content::{full_content_pipeline, ContentSpec};
pub use context::PipelineContext;
pub use error::PipelineError;
pub use media::{MediaMerger, NoMerger, NoUploader, Uploader};
pub use progress::{ChannelProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use result::{PipelineResult, StageOutcome, StageReport};
pub use runner::Pipeline;
pub use stage::{Binding, PipelineDefinition, Stage, StageAction, StageGroup};
