//! Job domain types and the job lifecycle state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{GenerationErrorKind, GenerationFailure};

/// Kind of media a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Music,
    Video,
    Image,
}

impl ContentType {
    pub const ALL: [ContentType; 3] = [ContentType::Music, ContentType::Video, ContentType::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Music => "music",
            ContentType::Video => "video",
            ContentType::Image => "image",
        }
    }

    /// File extension used for artifacts downloaded without an explicit path.
    pub fn default_extension(self) -> &'static str {
        match self {
            ContentType::Music => "mp3",
            ContentType::Video => "mp4",
            ContentType::Image => "png",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "music" => Ok(ContentType::Music),
            "video" => Ok(ContentType::Video),
            "image" => Ok(ContentType::Image),
            other => Err(ParseEnumError {
                kind: "content type",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a job.
///
/// Valid transitions:
/// `queued → processing → completed → downloaded`, `queued → failed`,
/// `processing → failed`. `failed` and `downloaded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Downloaded,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Downloaded,
        JobStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Downloaded => "downloaded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
                | (JobStatus::Completed, JobStatus::Downloaded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Downloaded | JobStatus::Failed)
    }

    /// Queued or processing: the provider has not delivered a result yet.
    pub fn is_pending(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "downloaded" => Ok(JobStatus::Downloaded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ParseEnumError {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

/// An unrecognised enum token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// One tracked generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Identifier assigned by the remote provider once accepted.
    pub generation_id: Option<String>,
    pub provider: String,
    pub content_type: ContentType,
    pub fingerprint: String,
    pub prompt: String,
    pub status: JobStatus,
    pub output_path: Option<String>,
    /// The originating invocation, kept for auditing.
    pub command: Option<String>,
    /// Created with `force`, bypassing duplicate detection.
    pub forced: bool,
    /// Set together with `error_message` when the job failed.
    pub error_kind: Option<GenerationErrorKind>,
    pub error_message: Option<String>,
    /// Material request parameters as a JSON object.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// First eight characters of the id, for display and file names.
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    /// The recorded failure of a failed job.
    pub fn failure(&self) -> Option<GenerationFailure> {
        if self.status != JobStatus::Failed {
            return None;
        }
        let kind = self.error_kind.unwrap_or(GenerationErrorKind::Unknown);
        let failure = GenerationFailure::new(kind, self.error_message.clone().unwrap_or_default());
        Some(match self.generation_id {
            Some(ref generation_id) => failure.with_generation_id(generation_id.clone()),
            None => failure,
        })
    }
}

/// Fields of a job supplied by the caller at creation time.
///
/// Status is always `queued`; timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub id: String,
    pub provider: String,
    pub content_type: ContentType,
    pub fingerprint: String,
    pub prompt: String,
    pub command: Option<String>,
    pub forced: bool,
    pub metadata: serde_json::Value,
}

impl NewJob {
    /// A new job with a freshly generated id.
    pub fn new(
        provider: impl Into<String>,
        content_type: ContentType,
        fingerprint: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider: provider.into(),
            content_type,
            fingerprint: fingerprint.into(),
            prompt: prompt.into(),
            command: None,
            forced: false,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Auxiliary fields written together with a status change.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub generation_id: Option<String>,
    pub output_path: Option<String>,
    pub error_kind: Option<GenerationErrorKind>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    pub fn generation_id(mut self, generation_id: impl Into<String>) -> Self {
        self.generation_id = Some(generation_id.into());
        self
    }

    pub fn output_path(mut self, output_path: impl Into<String>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    pub fn error_message(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    /// Records kind and message of a failure.
    pub fn failure(mut self, failure: &GenerationFailure) -> Self {
        self.error_kind = Some(failure.kind);
        self.error_message = Some(failure.message.clone());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use JobStatus::*;
        let valid = [
            (Queued, Processing),
            (Queued, Failed),
            (Processing, Completed),
            (Processing, Failed),
            (Completed, Downloaded),
        ];
        for from in JobStatus::ALL {
            for to in JobStatus::ALL {
                let expected = valid.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in JobStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(JobStatus::ALL.iter().all(|to| !status.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert_eq!(" Completed ".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert!("superseded".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_content_type_parse() {
        assert_eq!("MUSIC".parse::<ContentType>().unwrap(), ContentType::Music);
        let err = "audio".parse::<ContentType>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown content type 'audio'");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Downloaded).unwrap();
        assert_eq!(json, "\"downloaded\"");
    }

    #[test]
    fn test_new_job_ids_are_unique() {
        let a = NewJob::new("lyria", ContentType::Music, "fp", "p");
        let b = NewJob::new("lyria", ContentType::Music, "fp", "p");
        assert_ne!(a.id, b.id);
    }
}
