//! Ollama client and the provider implementations built on it

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, ProviderErrorKind, Result};

use super::embedding::{check_embeddings, EmbeddingProvider};
use super::llm::LlmProvider;
use super::retry_with_backoff;

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Server base URL without trailing slash
    base_url: String,
    /// Temperature for generation
    temperature: f32,
    /// Maximum retries
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a batch of texts with one `/api/embed` call
    pub async fn embed_many(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let url = url.as_str();

        retry_with_backoff("Ollama", self.max_retries, move || async move {
            let request = EmbedRequest { model, input: texts };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    Error::embedding(
                        ProviderErrorKind::Other,
                        format!("Embedding request failed: {}", e),
                    )
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::embedding(
                    ProviderErrorKind::from_status(status),
                    format!("Embedding failed: HTTP {} - {}", status, body),
                ));
            }

            let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                Error::embedding(
                    ProviderErrorKind::Other,
                    format!("Failed to parse embedding response: {}", e),
                )
            })?;

            Ok(embed_response.embeddings)
        })
        .await
    }

    /// Run a non-streaming completion of `prompt`
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let url = url.as_str();
        let temperature = self.temperature;

        tracing::info!("Generating answer with model: {}", model);

        retry_with_backoff("Ollama", self.max_retries, move || async move {
            let request = GenerateRequest {
                model,
                prompt,
                stream: false,
                options: GenerateOptions { temperature },
            };

            let response = self
                .client
                .post(url)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    Error::llm(
                        ProviderErrorKind::Other,
                        format!("Generation request failed: {}", e),
                    )
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::llm(
                    ProviderErrorKind::from_status(status),
                    format!("Generation failed: HTTP {} - {}", status, body),
                ));
            }

            let generate_response: GenerateResponse = response.json().await.map_err(|e| {
                Error::llm(
                    ProviderErrorKind::Other,
                    format!("Failed to parse generation response: {}", e),
                )
            })?;

            Ok(generate_response.response)
        })
        .await
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: Option<usize>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::from_client(Arc::new(OllamaClient::new(llm)?), embeddings))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, embeddings: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: embeddings.model.clone(),
            dimensions: embeddings.dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.client.embed_many(&self.model, texts).await?;
        check_embeddings(vectors, texts.len(), self.dimensions)
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self::from_client(
            Arc::new(OllamaClient::new(config)?),
            config.generate_model.clone(),
        ))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(&self.model, prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Build an embedder and an LLM sharing one Ollama client
pub fn ollama_providers(
    llm: &LlmConfig,
    embeddings: &EmbeddingConfig,
) -> Result<(OllamaEmbedder, OllamaLlm)> {
    let client = Arc::new(OllamaClient::new(llm)?);
    Ok((
        OllamaEmbedder::from_client(Arc::clone(&client), embeddings),
        OllamaLlm::from_client(client, llm.generate_model.clone()),
    ))
}
