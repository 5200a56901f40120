use std::time::Duration;

/// Polling behaviour for stages whose jobs finish asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Delay between status checks of a `queued` or `processing` job.
    pub poll_interval: Duration,
    /// Give up on a stage after this long; its job stays `processing`.
    pub max_wait: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(600),
        }
    }
}
