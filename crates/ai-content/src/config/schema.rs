use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::jobs::TrackerSettings;
use crate::pipeline::PipelineSettings;

/// Process-wide settings, usually read from `settings.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite job database. A leading `~` is the home directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Root of default artifact locations.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Upper bound for a single provider, merge or upload call.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    /// Cost per generated job, keyed by provider name.
    #[serde(default)]
    pub unit_costs: BTreeMap<String, f64>,
    #[serde(default)]
    pub defaults: DefaultProviders,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_database_path() -> String {
    "~/.ai-content/data/jobs.db".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_provider_timeout() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            output_dir: default_output_dir(),
            provider_timeout_secs: default_provider_timeout(),
            unit_costs: BTreeMap::new(),
            defaults: DefaultProviders::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Settings {
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.database_path)
    }

    pub fn output_dir(&self) -> PathBuf {
        expand_home(&self.output_dir)
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            output_dir: self.output_dir(),
            unit_costs: self
                .unit_costs
                .iter()
                .map(|(provider, cost)| (provider.trim().to_lowercase(), *cost))
                .collect(),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            poll_interval: Duration::from_secs(self.pipeline.poll_interval_secs),
            max_wait: Duration::from_secs(self.pipeline.max_wait_secs),
        }
    }
}

/// Provider used per content type when a request names none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultProviders {
    #[serde(default = "default_music_provider")]
    pub music_provider: String,
    #[serde(default = "default_image_provider")]
    pub image_provider: String,
    #[serde(default = "default_video_provider")]
    pub video_provider: String,
}

fn default_music_provider() -> String {
    "lyria".to_string()
}

fn default_image_provider() -> String {
    "imagen".to_string()
}

fn default_video_provider() -> String {
    "veo".to_string()
}

impl Default for DefaultProviders {
    fn default() -> Self {
        Self {
            music_provider: default_music_provider(),
            image_provider: default_image_provider(),
            video_provider: default_video_provider(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds between status checks of an asynchronous stage.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Seconds before an asynchronous stage is given up on.
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_wait() -> u64 {
    600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
