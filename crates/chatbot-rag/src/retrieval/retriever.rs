//! Top-k similarity retrieval

use std::sync::Arc;

use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::RetrievedChunk;

/// Embeds queries with the ingestion embedder and searches one store
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }


    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Retrieve the configured number of chunks
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve(query, self.top_k).await
    }

    /// The `k` chunks most similar to `query`, most similar first
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let query_vector = self.embedder.embed(query).await?;

        let store = Arc::clone(&self.store);
        let hits =
            tokio::task::spawn_blocking(move || store.similarity_search(&query_vector, k)).await??;

        tracing::debug!("Retrieved {} chunks for query", hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                text: hit.record.chunk_text,
                score: hit.score,
            })
            .collect())
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.name())
            .field("store", &self.store)
            .field("top_k", &self.top_k)
            .finish()
    }
}
