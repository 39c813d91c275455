//! OpenAI-compatible providers: `/v1/embeddings` and `/v1/chat/completions`

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, ProviderErrorKind, Result};

use super::embedding::{check_embeddings, EmbeddingProvider};
use super::llm::LlmProvider;
use super::retry_with_backoff;

/// Shared HTTP client for an OpenAI-compatible API
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    key_env: String,
    temperature: f32,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

/// Resolve `<base>/v1/<path>`, accepting bases that already carry a version
/// segment or the full endpoint
fn endpoint(base_url: &str, path: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with(&format!("/{path}")) {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/{path}");
    }
    format!("{normalized}/v1/{path}")
}

impl OpenAiClient {
    /// Create a client, reading the API key from the environment variable
    /// named by `llm.api_key_env`
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit key (`None` means unauthenticated)
    pub fn with_api_key(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; OpenAI-compatible requests will fail authentication",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.effective_base_url()),
            api_key: api_key.map(Secret::new),
            key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn api_key(&self, make: fn(ProviderErrorKind, String) -> Error) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .ok_or_else(|| make(ProviderErrorKind::Auth, format!("{} is not set", self.key_env)))
    }

    /// Embed texts in one request, returning vectors in input order
    pub async fn embed_many(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let key = self.api_key(|kind, msg| Error::embedding(kind, msg))?;
        let url = endpoint(&self.base_url, "embeddings");
        let url = url.as_str();

        retry_with_backoff("OpenAI", self.max_retries, move || async move {
            let response = self
                .client
                .post(url)
                .bearer_auth(key)
                .json(&EmbeddingRequest { model, input: texts })
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

            let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
                Error::embedding(
                    ProviderErrorKind::Other,
                    format!("Failed to parse embedding response: {}", e),
                )
            })?;

            let mut data = parsed.data;
            data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
            Ok(data.into_iter().map(|d| d.embedding).collect())
        })
        .await
    }

    /// Single-turn chat completion of `prompt`
    pub async fn chat(&self, model: &str, prompt: &str) -> Result<String> {
        let key = self.api_key(|kind, msg| Error::llm(kind, msg))?;
        let url = endpoint(&self.base_url, "chat/completions");
        let url = url.as_str();
        let temperature = self.temperature;

        tracing::info!("Generating answer with model: {}", model);

        retry_with_backoff("OpenAI", self.max_retries, move || async move {
            let request = ChatRequest {
                model,
                temperature,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
            };

            let response = self
                .client
                .post(url)
                .bearer_auth(key)
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

            let parsed: ChatResponse = response.json().await.map_err(|e| {
                Error::llm(
                    ProviderErrorKind::Other,
                    format!("Failed to parse generation response: {}", e),
                )
            })?;

            Ok(parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default())
        })
        .await
    }

    /// Whether the model listing endpoint answers successfully
    pub async fn health_check(&self) -> Result<bool> {
        let Some(key) = self.api_key.as_ref() else {
            return Ok(false);
        };
        let response = self
            .client
            .get(endpoint(&self.base_url, "models"))
            .bearer_auth(key.expose_secret())
            .send()
            .await;
        Ok(matches!(response, Ok(r) if r.status().is_success()))
    }
}

/// Embeddings through an OpenAI-compatible API (text-embedding-3-small)
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    pub fn from_client(client: Arc<OpenAiClient>, embeddings: &EmbeddingConfig) -> Self {
        Self {
            client,
            model: embeddings.model.clone(),
            dimensions: embeddings.dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
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
        "openai"
    }
}

/// Chat completions through an OpenAI-compatible API (gpt-4o)
pub struct OpenAiLlm {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiLlm {
    pub fn from_client(client: Arc<OpenAiClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.client.chat(&self.model, prompt).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Build an embedder and an LLM sharing one OpenAI-compatible client
pub fn openai_providers(
    llm: &LlmConfig,
    embeddings: &EmbeddingConfig,
) -> Result<(OpenAiEmbedder, OpenAiLlm)> {
    let client = Arc::new(OpenAiClient::new(llm)?);
    Ok((
        OpenAiEmbedder::from_client(Arc::clone(&client), embeddings),
        OpenAiLlm::from_client(client, llm.generate_model.clone()),
    ))
}
