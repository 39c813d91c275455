//! Core types for the RAG service

pub mod document;
pub mod query;

pub use document::{Chunk, Document, EmbeddingRecord, FileType};
pub use query::{ChatRequest, ChatResponse, RetrievedChunk};
