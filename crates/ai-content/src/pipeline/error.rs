use thiserror::Error;

use crate::jobs::TrackerError;

/// Faults that abort a whole pipeline run.
///
/// Stage failures are not errors; they are reported in the
/// [`PipelineResult`](super::PipelineResult).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job tracking failed: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Invalid pipeline '{pipeline}': {reason}")]
    InvalidDefinition { pipeline: String, reason: String },
}
