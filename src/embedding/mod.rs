//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and an implementation backed by an
//! OpenAI-compatible embeddings endpoint. The provider is created once per
//! process via [`create_provider`] and shared behind an `Arc`.

pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::BusyError;

/// Trait for embedding text into vectors.
///
/// Implementations produce vectors of exactly [`EmbeddingProvider::dimensions`]
/// values. Results are not trusted: callers run [`validate_embedding`] before
/// a vector reaches the store.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BusyError>;

    /// Number of dimensions this provider produces.
    fn dimensions(&self) -> usize;

    /// Model identifier recorded in `schema_meta`.
    fn model(&self) -> &str;
}

/// Create the embedding provider from config.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if config.api_key.is_empty() {
        tracing::warn!("embedding.api_key is empty; requests will be sent unauthenticated");
    }
    let provider = openai::OpenAiEmbeddings::new(config)?;
    Ok(Arc::new(provider))
}

/// Reject vectors that cannot be persisted: wrong length or any NaN/infinite
/// component. Both are storage faults, never silently stored.
pub fn validate_embedding(embedding: &[f32], dimensions: usize) -> Result<(), BusyError> {
    if embedding.len() != dimensions {
        return Err(BusyError::StorageFault(format!(
            "embedding has {} dimensions, expected {dimensions}",
            embedding.len()
        )));
    }
    if let Some(pos) = embedding.iter().position(|v| !v.is_finite()) {
        return Err(BusyError::StorageFault(format!(
            "embedding contains a non-finite value at index {pos}"
        )));
    }
    Ok(())
}
