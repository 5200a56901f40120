//! In-process stand-ins for the media merge and upload services.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use ai_content::pipeline::{MediaMerger, Uploader};
use ai_content::provider::{Completion, GenerationErrorKind, GenerationOutput};
use ai_content::GenerationResult;

/// Writes a placeholder merged file and records its inputs.
#[derive(Default)]
pub struct FileMerger {
    pub calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait]
impl MediaMerger for FileMerger {
    async fn merge(&self, audio: &Path, video: &Path, output: &Path) -> GenerationResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((audio.to_path_buf(), video.to_path_buf()));
        }
        if let Some(parent) = output.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return GenerationResult::failure(GenerationErrorKind::Unknown, e.to_string());
            }
        }
        match std::fs::write(output, b"merged") {
            Ok(()) => GenerationResult::ready(output),
            Err(e) => GenerationResult::failure(GenerationErrorKind::Unknown, e.to_string()),
        }
    }
}

/// A merger whose tool is unavailable.
pub struct FailingMerger;

#[async_trait]
impl MediaMerger for FailingMerger {
    async fn merge(&self, _audio: &Path, _video: &Path, _output: &Path) -> GenerationResult {
        GenerationResult::failure(GenerationErrorKind::Unknown, "ffmpeg missing")
    }
}

/// Accepts every destination except the ones marked as failing.
#[derive(Default)]
pub struct FakeUploader {
    failing: HashSet<String>,
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeUploader {
    pub fn failing_for(mut self, destination: &str) -> Self {
        self.failing.insert(destination.to_string());
        self
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, source: &Path, destination: &str) -> GenerationResult {
        if self.failing.contains(destination) {
            return GenerationResult::failure(
                GenerationErrorKind::ProviderRejected,
                format!("{} rejected the upload", destination),
            );
        }
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push((source.to_path_buf(), destination.to_string()));
        }
        GenerationResult::Success(GenerationOutput {
            completion: Completion::Ready,
            file_path: None,
            generation_id: None,
            raw_metadata: serde_json::json!({
                "url": format!("https://{}.example/watch/1", destination)
            }),
        })
    }
}
