//! Typed provider registry keyed by content type and provider name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::jobs::model::ContentType;

use super::GenerationProvider;

/// Maps `(content type, name)` to a provider instance.
///
/// Populated once at start-up; lookups are read-only afterwards.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<(ContentType, String), Arc<dyn GenerationProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider under its own name and content type,
    /// replacing any earlier registration with the same key.
    pub fn register(&mut self, provider: Arc<dyn GenerationProvider>) -> &mut Self {
        let content_type = provider.content_type();
        let name = provider.name().trim().to_lowercase();
        if self
            .providers
            .insert((content_type, name.clone()), provider)
            .is_some()
        {
            tracing::warn!(provider = %name, %content_type, "Replaced registered provider");
        }
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, content_type: ContentType, name: &str) -> Option<Arc<dyn GenerationProvider>> {
        self.providers
            .get(&(content_type, name.trim().to_lowercase()))
            .cloned()
    }

    /// Sorted names of the providers registered for a content type.
    pub fn names(&self, content_type: ContentType) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .keys()
            .filter(|(ct, _)| *ct == content_type)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
