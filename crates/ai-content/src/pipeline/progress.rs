use tokio::sync::broadcast;

use crate::provider::GenerationErrorKind;

/// Events emitted by the pipeline runner as stages settle.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        pipeline: String,
        stages: usize,
    },
    StageStarted {
        stage: String,
    },
    StageSucceeded {
        stage: String,
        job_id: Option<String>,
        duplicate: bool,
    },
    StageFailed {
        stage: String,
        kind: GenerationErrorKind,
        message: String,
    },
    StageSkipped {
        stage: String,
        reason: String,
    },
    Finished {
        pipeline: String,
        success: bool,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Forwards events to a broadcast channel; events sent while nobody is
/// subscribed are dropped.
pub struct ChannelProgress {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}
