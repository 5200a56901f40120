//! Narrow interfaces to the media merge and upload services.
//!
//! Both report through the same envelope as providers, so a failed merge
//! or upload is a stage failure, never an error.

use std::path::Path;

use async_trait::async_trait;

use crate::provider::{GenerationErrorKind, GenerationResult};

/// Combines an audio track and a video track into one file.
#[async_trait]
pub trait MediaMerger: Send + Sync {
    /// On success the envelope's `file_path` is the merged file.
    async fn merge(&self, audio: &Path, video: &Path, output: &Path) -> GenerationResult;
}

/// Publishes a local file.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// On success `raw_metadata["url"]` holds the remote location.
    async fn upload(&self, source: &Path, destination: &str) -> GenerationResult;
}

/// Merger used when none is configured; every merge fails.
pub struct NoMerger;

#[async_trait]
impl MediaMerger for NoMerger {
    async fn merge(&self, _audio: &Path, _video: &Path, _output: &Path) -> GenerationResult {
        GenerationResult::failure(
            GenerationErrorKind::InvalidInput,
            "No media merger configured",
        )
    }
}

/// Uploader used when none is configured; every upload fails.
pub struct NoUploader;

#[async_trait]
impl Uploader for NoUploader {
    async fn upload(&self, _source: &Path, destination: &str) -> GenerationResult {
        GenerationResult::failure(
            GenerationErrorKind::InvalidInput,
            format!("No uploader configured for '{}'", destination),
        )
    }
}
