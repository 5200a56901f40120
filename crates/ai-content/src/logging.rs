//! Process-wide log subscriber setup.
//!
//! Library code only emits events; the process entry point calls [`init`]
//! once. `log` records from dependencies are bridged into `tracing`.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Filter directive used when `RUST_LOG` is unset.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "ai_content=info",
        1 => "ai_content=debug",
        _ => "ai_content=trace",
    }
}

/// `RUST_LOG` if set and valid, otherwise the verbosity default.
pub fn filter_for(verbosity: u8) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = default_directive(verbosity);
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Installs a text subscriber. See [`init_with_format`].
pub fn init(verbosity: u8) -> Result<(), LoggingError> {
    init_with_format(verbosity, LogFormat::Text)
}

/// Installs the global subscriber and the `log` bridge.
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_with_format(verbosity: u8, format: LogFormat) -> Result<(), LoggingError> {
    let filter = filter_for(verbosity)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_target(false)))
        }
        LogFormat::Json => tracing::subscriber::set_global_default(registry.with(fmt::layer().json())),
    };
    installed.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(verbosity, ?format, "Logging initialized");
    Ok(())
}
