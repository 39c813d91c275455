//! Configuration for the RAG service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ingestion::PacingPolicy;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "CHATBOT_RAG_CONFIG";

/// Main RAG service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Document and store locations
    pub paths: PathsConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Generation model configuration
    pub llm: LlmConfig,
    /// Ingestion batching configuration
    pub ingest: IngestConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load a config file, falling back to defaults for missing sections
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Resolve configuration: defaults, then the TOML file (explicit path or
    /// `CHATBOT_RAG_CONFIG`), then `RAG_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `RAG_*` overrides from an environment lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("RAG_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("RAG_PORT") {
            self.server.port = parse_env("RAG_PORT", &v)?;
        }
        if let Some(v) = lookup("RAG_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RAG_DB_DIR") {
            self.paths.db_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RAG_COLLECTION") {
            self.paths.collection = v;
        }
        if let Some(v) = lookup("RAG_PROVIDER") {
            self.llm.provider = match v.to_lowercase().as_str() {
                "ollama" => ProviderKind::Ollama,
                "openai" => ProviderKind::OpenAi,
                other => {
                    return Err(Error::Config(format!("Unknown provider '{}'", other)));
                }
            };
        }
        if let Some(v) = lookup("RAG_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup("RAG_EMBED_MODEL") {
            self.embeddings.model = v;
        }
        if let Some(v) = lookup("RAG_GENERATE_MODEL") {
            self.llm.generate_model = v;
        }
        if let Some(v) = lookup("RAG_TEMPERATURE") {
            self.llm.temperature = parse_env("RAG_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("RAG_BATCH_SIZE") {
            self.ingest.batch_size = parse_env("RAG_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("RAG_BATCH_DELAY_MS") {
            self.ingest.batch_delay_ms = parse_env("RAG_BATCH_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("RAG_TOP_K") {
            self.retrieval.top_k = parse_env("RAG_TOP_K", &v)?;
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.ingest.batch_size == 0 {
            return Err(Error::Config("ingest.batch_size must be > 0".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be > 0".into()));
        }
        if self.paths.collection.trim().is_empty() {
            return Err(Error::Config("paths.collection must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {}='{}': {}", key, value, e)))
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Static frontend directory served under `/ui`
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            static_dir: None,
        }
    }
}

/// Filesystem layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Flat directory of source documents (.md / .pdf)
    pub data_dir: PathBuf,
    /// Persistent vector store directory
    pub db_dir: PathBuf,
    /// Collection name inside the store
    pub collection: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./datas"),
            db_dir: PathBuf::from("./vector_db"),
            collection: "sw_db".to_string(),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Which HTTP API the providers talk to
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI or any OpenAI-compatible endpoint
    OpenAi,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier (stored with the collection)
    pub model: String,
    /// Expected output dimensions; `None` accepts whatever the model returns
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            dimensions: None,
        }
    }
}

/// Generation model and provider connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider API flavour (used for both embeddings and generation)
    pub provider: ProviderKind,
    /// Provider base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of transport-level retries for failed requests
    pub max_retries: u32,
    /// Environment variable holding the API key (OpenAI-compatible only)
    pub api_key_env: String,
}

/// Default Ollama server
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default OpenAI API host
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.1,
            timeout_secs: 120,
            max_retries: 2,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl LlmConfig {
    /// Base URL to use, swapping the Ollama default for the OpenAI host when
    /// the OpenAI provider is selected without an explicit URL
    pub fn effective_base_url(&self) -> String {
        match self.provider {
            ProviderKind::OpenAi if self.base_url == DEFAULT_OLLAMA_URL => {
                DEFAULT_OPENAI_URL.to_string()
            }
            _ => self.base_url.clone(),
        }
    }
}

/// What `load_and_embed` does when the store directory already exists
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExistingStorePolicy {
    /// Keep the existing store and skip embedding
    #[default]
    Reuse,
    /// Embed again and append; identical chunks are not duplicated
    Append,
    /// Delete the store directory and ingest from scratch
    Rebuild,
}

/// Ingestion batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Chunks per embedding call
    pub batch_size: usize,
    /// Pacing delay before every batch after the first (milliseconds)
    pub batch_delay_ms: u64,
    /// Retries of a failed batch before it is skipped
    pub batch_retries: u32,
    /// Upper bound for the retry backoff (milliseconds)
    pub max_retry_delay_ms: u64,
    /// Re-ingestion policy for an existing store
    pub on_existing: ExistingStorePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay_ms: 500,
            batch_retries: 0,
            max_retry_delay_ms: 30_000,
            on_existing: ExistingStorePolicy::Reuse,
        }
    }
}

impl IngestConfig {
    /// Pacing/retry policy described by this section
    pub fn pacing_policy(&self) -> PacingPolicy {
        PacingPolicy {
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            max_retries: self.batch_retries,
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the generation model
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}
