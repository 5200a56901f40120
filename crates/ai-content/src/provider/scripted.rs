//! A provider that replays pre-recorded envelopes.
//!
//! Used for dry runs of pipelines and throughout the test suite. Responses
//! are consumed in order; once a queue is empty the fallback response is
//! returned.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::jobs::model::ContentType;

use super::{
    GenerationErrorKind, GenerationFailure, GenerationProvider, GenerationRequest,
    GenerationResult, ProviderCapabilities,
};

pub struct ScriptedProvider {
    name: String,
    content_type: ContentType,
    capabilities: ProviderCapabilities,
    delay: Option<Duration>,
    generate_queue: Mutex<VecDeque<GenerationResult>>,
    generate_fallback: GenerationResult,
    status_queues: Mutex<HashMap<String, VecDeque<GenerationResult>>>,
    download_payload: Vec<u8>,
    download_failure: Option<GenerationFailure>,
    generate_calls: AtomicUsize,
    status_calls: AtomicUsize,
    download_calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    /// A provider that reports every generation as pending with a fresh id
    /// and supports status checks and downloads.
    pub fn new(name: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            name: name.into(),
            content_type,
            capabilities: ProviderCapabilities {
                supports_status: true,
                supports_download: true,
                supports_vocals: false,
                supports_reference_audio: false,
            },
            delay: None,
            generate_queue: Mutex::new(VecDeque::new()),
            generate_fallback: GenerationResult::failure(
                GenerationErrorKind::Unknown,
                "No scripted response",
            ),
            status_queues: Mutex::new(HashMap::new()),
            download_payload: b"scripted artifact".to_vec(),
            download_failure: None,
            generate_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sleeps before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues the next `generate` response.
    pub fn then_generate(self, result: GenerationResult) -> Self {
        if let Ok(mut queue) = self.generate_queue.lock() {
            queue.push_back(result);
        }
        self
    }

    /// Response used once the `generate` queue is exhausted.
    pub fn with_generate_fallback(mut self, result: GenerationResult) -> Self {
        self.generate_fallback = result;
        self
    }

    /// Queues the next `check_status` response for a generation id.
    pub fn then_status(self, generation_id: impl Into<String>, result: GenerationResult) -> Self {
        if let Ok(mut queues) = self.status_queues.lock() {
            queues
                .entry(generation_id.into())
                .or_default()
                .push_back(result);
        }
        self
    }

    pub fn with_download_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.download_payload = payload.into();
        self
    }

    pub fn with_download_failure(mut self, failure: GenerationFailure) -> Self {
        self.download_failure = Some(failure);
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    /// Requests received by `generate`, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.pause().await;

        let next = self
            .generate_queue
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        next.unwrap_or_else(|| self.generate_fallback.clone())
    }

    async fn check_status(&self, generation_id: &str) -> GenerationResult {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if !self.capabilities.supports_status {
            return GenerationResult::failure(
                GenerationErrorKind::InvalidInput,
                format!("Provider '{}' does not support status checks", self.name),
            );
        }

        let next = self
            .status_queues
            .lock()
            .ok()
            .and_then(|mut queues| queues.get_mut(generation_id).and_then(|q| q.pop_front()));
        next.unwrap_or_else(|| GenerationResult::pending(generation_id))
    }

    async fn download(
        &self,
        generation_id: &str,
        output_path: &Path,
    ) -> Result<PathBuf, GenerationFailure> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(ref failure) = self.download_failure {
            return Err(failure.clone().with_generation_id(generation_id));
        }

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                GenerationFailure::new(
                    GenerationErrorKind::Unknown,
                    format!("Failed to create '{}': {}", parent.display(), e),
                )
            })?;
        }
        tokio::fs::write(output_path, &self.download_payload)
            .await
            .map_err(|e| {
                GenerationFailure::new(
                    GenerationErrorKind::Unknown,
                    format!("Failed to write '{}': {}", output_path.display(), e),
                )
            })?;

        Ok(output_path.to_path_buf())
    }
}
