use std::path::Path;

use crate::config::schema::Settings;
use crate::error::ConfigError;

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = if content.trim().is_empty() {
        Settings::default()
    } else {
        serde_yaml::from_str(content)?
    };

    validate_settings(&settings)?;

    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::Validation { message };

    if settings.database_path.trim().is_empty() {
        return Err(invalid("database_path must not be empty".to_string()));
    }
    if settings.provider_timeout_secs == 0 {
        return Err(invalid("provider_timeout_secs must be greater than 0".to_string()));
    }

    let pipeline = &settings.pipeline;
    if pipeline.poll_interval_secs == 0 {
        return Err(invalid("pipeline.poll_interval_secs must be greater than 0".to_string()));
    }
    if pipeline.max_wait_secs < pipeline.poll_interval_secs {
        return Err(invalid(format!(
            "pipeline.max_wait_secs ({}) must be at least poll_interval_secs ({})",
            pipeline.max_wait_secs, pipeline.poll_interval_secs
        )));
    }

    for (provider, cost) in &settings.unit_costs {
        if !cost.is_finite() || *cost < 0.0 {
            return Err(invalid(format!(
                "unit cost for '{}' must be a non-negative number, got {}",
                provider, cost
            )));
        }
    }

    let defaults = &settings.defaults;
    for (field, value) in [
        ("music_provider", &defaults.music_provider),
        ("image_provider", &defaults.image_provider),
        ("video_provider", &defaults.video_provider),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(format!("defaults.{} must not be empty", field)));
        }
    }

    Ok(())
}
