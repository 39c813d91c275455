//! Request and response bodies of the HTTP API

use serde::{Deserialize, Serialize};

/// POST /chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The question to answer
    pub question: String,
}

impl ChatRequest {
    /// Create a new request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }

    /// Whether the question has any non-whitespace content
    pub fn is_blank(&self) -> bool {
        self.question.trim().is_empty()
    }
}

/// POST /chat response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated (or fallback) answer
    pub answer: String,
}

/// A chunk returned by the retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk text
    pub text: String,
    /// Cosine similarity to the query (higher is more similar)
    pub score: f32,
}
