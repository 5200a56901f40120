//! Provider capability interface.
//!
//! Every generation backend implements [`GenerationProvider`]. Concrete
//! HTTP clients live outside this crate; they are registered in a
//! [`ProviderRegistry`] by the process entry point before any dispatch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::jobs::model::ContentType;

pub mod registry;
pub mod request;
pub mod result;
pub mod scripted;

pub use registry::ProviderRegistry;
pub use request::GenerationRequest;
pub use result::{
    Completion, GenerationErrorKind, GenerationFailure, GenerationOutput, GenerationResult,
};
pub use scripted::ScriptedProvider;

/// Optional features a provider supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// `check_status` can be polled with a generation id.
    pub supports_status: bool,
    /// `download` retrieves finished artifacts.
    pub supports_download: bool,
    /// Sung vocals / lyrics are honoured.
    pub supports_vocals: bool,
    /// A reference audio URL is honoured for style transfer.
    pub supports_reference_audio: bool,
}

/// A generation backend for one content type.
///
/// Implementations must not panic or return faults out of band: every
/// problem is reported as a [`GenerationResult::Failure`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Registry name, e.g. `"lyria"`.
    fn name(&self) -> &str;

    fn content_type(&self) -> ContentType;

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;

    async fn check_status(&self, generation_id: &str) -> GenerationResult {
        GenerationResult::failure(
            GenerationErrorKind::InvalidInput,
            format!(
                "Provider '{}' does not support status checks (generation {})",
                self.name(),
                generation_id
            ),
        )
    }

    async fn download(
        &self,
        generation_id: &str,
        output_path: &Path,
    ) -> Result<PathBuf, GenerationFailure> {
        let _ = output_path;
        Err(GenerationFailure::new(
            GenerationErrorKind::InvalidInput,
            format!(
                "Provider '{}' does not support downloads (generation {})",
                self.name(),
                generation_id
            ),
        ))
    }
}
