//! Test harness for isolated test execution.
//!
//! `TestHarness` owns a temporary directory holding the job database and
//! the artifact output directory, plus the providers registered for the
//! test.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use ai_content::pipeline::{MediaMerger, Pipeline, PipelineSettings, Uploader};
use ai_content::provider::{GenerationProvider, ProviderRegistry};
use ai_content::{open_tracker, Database, JobStore, JobTracker, Settings};

pub struct TestHarness {
    temp_dir: TempDir,
    /// Job database file inside the temp directory.
    pub db_path: PathBuf,
    /// Default artifact directory inside the temp directory.
    pub output_dir: PathBuf,
    registry: ProviderRegistry,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("jobs.db");
        let output_dir = temp_dir.path().join("output");

        Self {
            temp_dir,
            db_path,
            output_dir,
            registry: ProviderRegistry::new(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.registry.register(provider);
        self
    }

    pub fn path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            database_path: self.db_path.display().to_string(),
            output_dir: self.output_dir.display().to_string(),
            provider_timeout_secs: 5,
            ..Settings::default()
        }
    }

    /// A tracker over the harness database. Trackers created from the same
    /// harness share the database file.
    pub fn tracker(&self) -> Arc<JobTracker> {
        Arc::new(
            open_tracker(&self.settings(), self.registry.clone())
                .expect("Failed to open tracker"),
        )
    }

    /// A second, independent connection to the harness database.
    pub fn store(&self) -> JobStore {
        JobStore::new(Database::open(&self.db_path).expect("Failed to open database"))
    }

    /// A pipeline with fast polling.
    pub fn pipeline(
        &self,
        merger: Arc<dyn MediaMerger>,
        uploader: Arc<dyn Uploader>,
    ) -> Pipeline {
        Pipeline::new(self.tracker())
            .with_merger(merger)
            .with_uploader(uploader)
            .with_settings(PipelineSettings {
                poll_interval: Duration::from_millis(5),
                max_wait: Duration::from_millis(500),
            })
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("artifacts").join(name)
    }
}
