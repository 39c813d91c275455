//! Batched, paced embedding of chunks into the vector store

use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::sleep;

use crate::config::RagConfig;
use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::{Chunk, EmbeddingRecord};

use super::policy::PacingPolicy;

/// How an ingestion run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new collection was created
    Created,
    /// Records were appended to an existing collection
    Appended,
    /// An existing store was kept and nothing was embedded
    Reused,
    /// There was nothing to embed
    EmptyCorpus,
    /// Every batch failed, so no store was created
    AllBatchesFailed,
    /// An existing store could not be opened or removed; nothing was embedded
    OpenFailed,
}

/// Summary of an ingestion run
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub outcome: IngestOutcome,
    /// Chunks handed to the batcher
    pub chunks: usize,
    /// Batches attempted
    pub batches: usize,
    /// 0-based indexes of batches that were skipped after failing
    pub failed_batches: Vec<usize>,
    /// Rows actually written (duplicates ignored)
    pub records_written: usize,
    /// Resulting store, if one exists
    pub store: Option<Arc<VectorStore>>,
}

impl IngestReport {
    pub(crate) fn without_batches(outcome: IngestOutcome, store: Option<Arc<VectorStore>>) -> Self {
        Self {
            outcome,
            chunks: 0,
            batches: 0,
            failed_batches: Vec::new(),
            records_written: 0,
            store,
        }
    }

    /// The existing store could not be used
    pub fn open_failed() -> Self {
        Self::without_batches(IngestOutcome::OpenFailed, None)
    }

    /// An existing store was kept as is
    pub fn reused(store: Arc<VectorStore>) -> Self {
        Self::without_batches(IngestOutcome::Reused, Some(store))
    }
}

/// Embeds chunks in fixed-size batches and persists each batch before the
/// next one starts. A failing batch is logged and skipped.
pub struct EmbeddingBatcher {
    embedder: Arc<dyn EmbeddingProvider>,
    store_path: PathBuf,
    collection: String,
    batch_size: usize,
    pacing: PacingPolicy,
}

impl EmbeddingBatcher {
    /// Create a batcher with the default batch size (100) and pacing
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store_path: impl Into<PathBuf>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            store_path: store_path.into(),
            collection: collection.into(),
            batch_size: 100,
            pacing: PacingPolicy::default(),
        }
    }

    /// Create from config
    pub fn from_config(embedder: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self::new(embedder, &config.paths.db_dir, &config.paths.collection)
            .with_batch_size(config.ingest.batch_size)
            .with_pacing(config.ingest.pacing_policy())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    /// Embed `chunks` into a new collection, or append them to `existing`
    pub async fn ingest(
        &self,
        chunks: Vec<Chunk>,
        existing: Option<Arc<VectorStore>>,
    ) -> IngestReport {
        if chunks.is_empty() {
            tracing::warn!("No chunks to embed");
            return IngestReport::without_batches(IngestOutcome::EmptyCorpus, existing);
        }

        let appending = existing.is_some();
        let mut store = existing;
        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut failed_batches = Vec::new();
        let mut records_written = 0usize;

        tracing::info!(
            "Embedding {} chunks in {} batches of up to {}",
            chunks.len(),
            total_batches,
            self.batch_size
        );

        for (index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let delay = self.pacing.delay_before(index);
            if !delay.is_zero() {
                sleep(delay).await;
            }

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = match self.embed_with_retries(index, &texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    tracing::error!(
                        "Batch {}/{} failed to embed, skipping: {}",
                        index + 1,
                        total_batches,
                        e
                    );
                    failed_batches.push(index);
                    continue;
                }
            };

            let records: Vec<EmbeddingRecord> = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| chunk.into_record(vector))
                .collect();

            match self.write_batch(&mut store, records).await {
                Ok(written) => {
                    records_written += written;
                    tracing::info!(
                        "Batch {}/{} stored ({} records)",
                        index + 1,
                        total_batches,
                        written
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Batch {}/{} could not be stored, skipping: {}",
                        index + 1,
                        total_batches,
                        e
                    );
                    failed_batches.push(index);
                }
            }
        }

        let outcome = match (&store, appending) {
            (None, _) => IngestOutcome::AllBatchesFailed,
            (Some(_), true) => IngestOutcome::Appended,
            (Some(_), false) => IngestOutcome::Created,
        };

        if !failed_batches.is_empty() {
            tracing::warn!(
                "{} of {} batches failed: {:?}",
                failed_batches.len(),
                total_batches,
                failed_batches
            );
        }

        IngestReport {
            outcome,
            chunks: chunks.len(),
            batches: total_batches,
            failed_batches,
            records_written,
            store,
        }
    }

    async fn embed_with_retries(&self, index: usize, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0u32;
        loop {
            match self.embedder.embed_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) if self.pacing.should_retry(attempt) => {
                    attempt += 1;
                    let delay = self.pacing.retry_delay(attempt);
                    tracing::warn!(
                        "Batch {} failed (attempt {}), retrying in {:?}: {}",
                        index + 1,
                        attempt,
                        delay,
                        e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Create the collection from the first stored batch, append afterwards
    async fn write_batch(
        &self,
        store: &mut Option<Arc<VectorStore>>,
        records: Vec<EmbeddingRecord>,
    ) -> Result<usize> {
        if let Some(existing) = store.as_ref() {
            let existing = Arc::clone(existing);
            return tokio::task::spawn_blocking(move || existing.append(records)).await?;
        }

        let path = self.store_path.clone();
        let collection = self.collection.clone();
        let model = self.embedder.model().to_string();
        let created = tokio::task::spawn_blocking(move || {
            VectorStore::create(&path, &collection, &model, records)
        })
        .await??;

        let written = created.len()?;
        *store = Some(Arc::new(created));
        Ok(written)
    }
}
