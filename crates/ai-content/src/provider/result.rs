//! The uniform success/failure envelope returned by every provider call.
//!
//! Providers never surface faults as Rust errors: a failed generation is a
//! `GenerationResult::Failure` value so that one failed stage cannot abort
//! its siblings.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a provider call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationErrorKind {
    ProviderRejected,
    QuotaExceeded,
    Timeout,
    InvalidInput,
    Unknown,
}

impl GenerationErrorKind {
    /// Failures that say nothing about the remote generation itself.
    pub fn is_transient(self) -> bool {
        matches!(self, GenerationErrorKind::Timeout | GenerationErrorKind::Unknown)
    }
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationErrorKind::ProviderRejected => "ProviderRejected",
            GenerationErrorKind::QuotaExceeded => "QuotaExceeded",
            GenerationErrorKind::Timeout => "Timeout",
            GenerationErrorKind::InvalidInput => "InvalidInput",
            GenerationErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for GenerationErrorKind {
    type Err = crate::jobs::model::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ProviderRejected" => Ok(GenerationErrorKind::ProviderRejected),
            "QuotaExceeded" => Ok(GenerationErrorKind::QuotaExceeded),
            "Timeout" => Ok(GenerationErrorKind::Timeout),
            "InvalidInput" => Ok(GenerationErrorKind::InvalidInput),
            "Unknown" => Ok(GenerationErrorKind::Unknown),
            other => Err(crate::jobs::model::ParseEnumError {
                kind: "error kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether the remote side has finished producing the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Accepted; poll `check_status` with the generation id.
    Pending,
    /// Finished; `file_path` is set if the artifact is already local.
    Ready,
}

/// Payload of a successful provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub completion: Completion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    /// Provider response details, passed through untouched.
    #[serde(default)]
    pub raw_metadata: Value,
}

/// Payload of a failed provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub kind: GenerationErrorKind,
    pub message: String,
    /// Set when the provider accepted the request before failing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
}

impl GenerationFailure {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            generation_id: None,
        }
    }

    pub fn with_generation_id(mut self, generation_id: impl Into<String>) -> Self {
        self.generation_id = Some(generation_id.into());
        self
    }
}

impl fmt::Display for GenerationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for GenerationFailure {}

impl FromStr for GenerationFailure {
    type Err = crate::jobs::model::ParseEnumError;

    /// Parses the `"Kind: message"` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, message) = s.split_once(": ").unwrap_or((s, ""));
        Ok(GenerationFailure::new(kind.parse()?, message))
    }
}

/// Result of one provider invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationResult {
    Success(GenerationOutput),
    Failure(GenerationFailure),
}

impl GenerationResult {
    /// A finished generation whose artifact is already on local disk.
    pub fn ready(file_path: impl Into<PathBuf>) -> Self {
        GenerationResult::Success(GenerationOutput {
            completion: Completion::Ready,
            file_path: Some(file_path.into()),
            generation_id: None,
            raw_metadata: Value::Null,
        })
    }

    /// A finished generation that still has to be downloaded.
    pub fn ready_remote(generation_id: impl Into<String>) -> Self {
        GenerationResult::Success(GenerationOutput {
            completion: Completion::Ready,
            file_path: None,
            generation_id: Some(generation_id.into()),
            raw_metadata: Value::Null,
        })
    }

    /// An accepted asynchronous generation.
    pub fn pending(generation_id: impl Into<String>) -> Self {
        GenerationResult::Success(GenerationOutput {
            completion: Completion::Pending,
            file_path: None,
            generation_id: Some(generation_id.into()),
            raw_metadata: Value::Null,
        })
    }

    pub fn failure(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        GenerationResult::Failure(GenerationFailure::new(kind, message))
    }

    pub fn with_generation_id(mut self, generation_id: impl Into<String>) -> Self {
        let id = Some(generation_id.into());
        match &mut self {
            GenerationResult::Success(output) => output.generation_id = id,
            GenerationResult::Failure(failure) => failure.generation_id = id,
        }
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        if let GenerationResult::Success(ref mut output) = self {
            output.raw_metadata = metadata;
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    pub fn generation_id(&self) -> Option<&str> {
        match self {
            GenerationResult::Success(output) => output.generation_id.as_deref(),
            GenerationResult::Failure(failure) => failure.generation_id.as_deref(),
        }
    }

    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            GenerationResult::Success(output) => output.file_path.as_ref(),
            GenerationResult::Failure(_) => None,
        }
    }

    pub fn failure_ref(&self) -> Option<&GenerationFailure> {
        match self {
            GenerationResult::Failure(failure) => Some(failure),
            GenerationResult::Success(_) => None,
        }
    }
}

impl From<GenerationFailure> for GenerationResult {
    fn from(failure: GenerationFailure) -> Self {
        GenerationResult::Failure(failure)
    }
}
