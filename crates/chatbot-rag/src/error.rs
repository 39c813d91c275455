//! Error types for the RAG service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a failure reported by an embedding or generation provider.
///
/// Providers assign the kind from the HTTP status (or from a missing
/// credential) so callers never have to inspect error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Missing, rejected or expired credentials
    Auth,
    /// The requested model does not exist or is not being served
    ModelUnavailable,
    /// Transport failures, rate limits, malformed responses, server errors
    Other,
}

impl ProviderErrorKind {
    /// Classify an HTTP status returned by a provider
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => Self::Auth,
            reqwest::StatusCode::NOT_FOUND => Self::ModelUnavailable,
            _ => Self::Other,
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Other)
    }
}

/// RAG service errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Embedding provider error
    #[error("Embedding generation failed: {message}")]
    Embedding {
        kind: ProviderErrorKind,
        message: String,
    },

    /// Generation provider error
    #[error("LLM error: {message}")]
    Llm {
        kind: ProviderErrorKind,
        message: String,
    },

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// A vector does not match the collection's dimensionality
    #[error("Embedding dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The collection was built with a different embedding model
    #[error("Collection was embedded with '{stored}' but '{configured}' is configured")]
    ModelMismatch { stored: String, configured: String },

    /// No store (or collection) at the given location
    #[error("Vector store not found: {0}")]
    StoreNotFound(PathBuf),

    /// A collection already exists where a new one was to be created
    #[error("Vector store already exists: {0}")]
    StoreExists(PathBuf),

    /// Malformed request from the caller
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Embedding {
            kind,
            message: message.into(),
        }
    }

    /// Create an LLM error
    pub fn llm(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self::Llm {
            kind,
            message: message.into(),
        }
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Provider category, if this error came from a provider
    pub fn provider_kind(&self) -> Option<ProviderErrorKind> {
        match self {
            Error::Embedding { kind, .. } | Error::Llm { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::VectorDb(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Task join error: {}", err))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::InvalidRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::FileParse { .. } => (StatusCode::BAD_REQUEST, "parse_error"),
            Error::UnsupportedFileType(_) => (StatusCode::BAD_REQUEST, "unsupported_type"),
            Error::Embedding { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error"),
            Error::Llm { .. } => (StatusCode::SERVICE_UNAVAILABLE, "llm_error"),
            Error::VectorDb(_)
            | Error::DimensionMismatch { .. }
            | Error::ModelMismatch { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "vector_db_error"),
            Error::StoreNotFound(_) => (StatusCode::SERVICE_UNAVAILABLE, "store_not_found"),
            Error::StoreExists(_) => (StatusCode::CONFLICT, "store_exists"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
