//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::{Error, ProviderErrorKind, Result};

/// Trait for generating text embeddings
///
/// The same provider must embed both the corpus and the queries, so a store
/// remembers `model()` and refuses to be searched with another one.
///
/// Implementations:
/// - `OllamaEmbedder`: local Ollama server (nomic-embed-text)
/// - `OpenAiEmbedder`: OpenAI-compatible `/v1/embeddings` (text-embedding-3-small)
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for multiple texts in one request, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::embedding(ProviderErrorKind::Other, "empty embedding response"))
    }

    /// Model identifier recorded with the collection
    fn model(&self) -> &str;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Validate a provider response against the request: one vector per input
/// and, when configured, the expected dimensionality
pub(crate) fn check_embeddings(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    expected_dims: Option<usize>,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(Error::embedding(
            ProviderErrorKind::Other,
            format!(
                "provider returned {} embeddings for {} inputs",
                vectors.len(),
                expected_count
            ),
        ));
    }
    if let Some(dims) = expected_dims {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(Error::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }
    }
    Ok(vectors)
}
