//! Persistent vector storage

mod vector_store;

pub use vector_store::{cosine_similarity, ScoredRecord, VectorStore, DB_FILE_NAME};
