//! chatbot-rag: question answering over a local directory of documents
//!
//! Markdown and PDF files are split into overlapping chunks, embedded in
//! paced batches and kept in a persistent SQLite vector store. Questions are
//! answered by retrieving the closest chunks and prompting a generation
//! model to answer from them only.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::RagConfig;
pub use error::{Error, ProviderErrorKind, Result};
pub use service::{ProviderHealth, RagService, ServiceState, ServiceStatus};
pub use types::{
    document::{Chunk, Document, EmbeddingRecord, FileType},
    query::{ChatRequest, ChatResponse, RetrievedChunk},
};
