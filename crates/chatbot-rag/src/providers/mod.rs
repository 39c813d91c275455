//! Provider abstractions for embeddings and answer generation
//!
//! Both traits have an Ollama and an OpenAI-compatible implementation; the
//! one in use is picked by `llm.provider` in the configuration.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{ProviderKind, RagConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
#[cfg(test)]
pub use llm::MockLlmProvider;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use openai::{OpenAiClient, OpenAiEmbedder, OpenAiLlm};

/// Embedding and generation providers as configured
pub fn build_providers(
    config: &RagConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    tracing::info!(
        "Using {:?} providers (embed: {}, generate: {})",
        config.llm.provider,
        config.embeddings.model,
        config.llm.generate_model
    );

    match config.llm.provider {
        ProviderKind::Ollama => {
            let (embedder, llm) = ollama::ollama_providers(&config.llm, &config.embeddings)?;
            Ok((Arc::new(embedder), Arc::new(llm)))
        }
        ProviderKind::OpenAi => {
            let (embedder, llm) = openai::openai_providers(&config.llm, &config.embeddings)?;
            Ok((Arc::new(embedder), Arc::new(llm)))
        }
    }
}

/// Retry a provider request with exponential backoff (1s, 2s, 4s, ...).
/// Only errors whose provider kind is retryable are attempted again.
pub(crate) async fn retry_with_backoff<F, Fut, T>(
    provider: &str,
    max_retries: u32,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let retryable = e.provider_kind().is_some_and(|k| k.is_retryable());
                if !retryable || attempt >= max_retries {
                    return Err(e);
                }
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "{} request failed (attempt {}/{}), retrying in {:?}: {}",
                    provider,
                    attempt + 1,
                    max_retries + 1,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
