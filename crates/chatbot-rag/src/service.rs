//! RAG service: ingestion, store lifecycle and question answering

use parking_lot::RwLock;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ExistingStorePolicy, RagConfig};
use crate::error::{Error, Result};
use crate::generation::{fallback, AnswerChain};
use crate::ingestion::{DocumentLoader, EmbeddingBatcher, IngestOutcome, IngestReport, TextChunker};
use crate::providers::{build_providers, EmbeddingProvider, LlmProvider};
use crate::retrieval::Retriever;
use crate::store::VectorStore;

/// Lifecycle of the service's store and answer chain
#[derive(Debug, Clone, Default)]
pub enum ServiceState {
    /// No store is open
    #[default]
    Uninitialized,
    /// A store is open but no chain has been built on it yet
    StoreOpen(Arc<VectorStore>),
    /// Ready to answer questions
    ChainReady(Arc<VectorStore>, Arc<AnswerChain>),
}

impl ServiceState {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceState::Uninitialized => "uninitialized",
            ServiceState::StoreOpen(_) => "store_open",
            ServiceState::ChainReady(..) => "chain_ready",
        }
    }

    fn store(&self) -> Option<Arc<VectorStore>> {
        match self {
            ServiceState::Uninitialized => None,
            ServiceState::StoreOpen(store) | ServiceState::ChainReady(store, _) => {
                Some(Arc::clone(store))
            }
        }
    }

    fn chain(&self) -> Option<Arc<AnswerChain>> {
        match self {
            ServiceState::ChainReady(_, chain) => Some(Arc::clone(chain)),
            _ => None,
        }
    }
}

/// Snapshot of the service state for health and readiness reporting
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    /// `uninitialized`, `store_open` or `chain_ready`
    pub state: &'static str,
    /// Whether questions are answered from documents
    pub ready: bool,
    /// Collection name
    pub collection: String,
    /// Records in the open store, if any
    pub records: Option<usize>,
}

/// Reachability of the configured providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub embedding: bool,
    pub llm: bool,
}

/// Upper bound on a single provider health probe
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Question answering over a local document directory
///
/// Each instance owns its configuration, providers and store handle, so
/// several services can coexist in one process.
pub struct RagService {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    state: RwLock<ServiceState>,
}

impl RagService {
    /// Create a service with explicit providers
    pub fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            config,
            embedder,
            llm,
            state: RwLock::new(ServiceState::Uninitialized),
        }
    }

    /// Create a service with the providers named in the configuration
    pub fn from_config(config: RagConfig) -> Result<Self> {
        let (embedder, llm) = build_providers(&config)?;
        Ok(Self::new(config, embedder, llm))
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        self.state.read().clone()
    }

    /// Load the document directory, chunk it and embed it into the store
    ///
    /// Never fails: unreadable files, failed batches and an empty corpus are
    /// logged and reflected in the report.
    pub async fn load_and_embed(&self) -> IngestReport {
        let db_dir = &self.config.paths.db_dir;
        let mut existing = None;

        if VectorStore::exists(db_dir) {
            match self.config.ingest.on_existing {
                ExistingStorePolicy::Reuse | ExistingStorePolicy::Append => {
                    match self.open_existing().await {
                        Ok(Some(store)) => {
                            if self.config.ingest.on_existing == ExistingStorePolicy::Reuse {
                                tracing::info!(
                                    "Reusing existing vector store at {}",
                                    db_dir.display()
                                );
                                return IngestReport::reused(store);
                            }
                            existing = Some(store);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(
                                "Existing vector store at {} cannot be opened: {}",
                                db_dir.display(),
                                e
                            );
                            return IngestReport::open_failed();
                        }
                    }
                }
                ExistingStorePolicy::Rebuild => {
                    *self.state.write() = ServiceState::Uninitialized;
                    let dir = db_dir.clone();
                    let reset = tokio::task::spawn_blocking(move || VectorStore::reset(&dir)).await;
                    if let Err(e) = reset.map_err(Error::from).and_then(|r| r) {
                        tracing::error!("Failed to remove {}: {}", db_dir.display(), e);
                        return IngestReport::open_failed();
                    }
                }
            }
        }

        let data_dir = self.config.paths.data_dir.clone();
        let chunker = TextChunker::from_config(&self.config.chunking);
        let split = tokio::task::spawn_blocking(move || {
            let documents = DocumentLoader::new().load_directory(&data_dir);
            chunker.split(&documents)
        })
        .await;

        let chunks = match split {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!("Document loading task failed: {}", e);
                Vec::new()
            }
        };

        if chunks.is_empty() {
            tracing::warn!(
                "No documents to embed in {}",
                self.config.paths.data_dir.display()
            );
            return IngestReport::without_batches(IngestOutcome::EmptyCorpus, existing);
        }
        tracing::info!("Split documents into {} chunks", chunks.len());

        let batcher = EmbeddingBatcher::from_config(Arc::clone(&self.embedder), &self.config);
        let report = batcher.ingest(chunks, existing).await;

        match &report.store {
            Some(store) => {
                *self.state.write() = ServiceState::StoreOpen(Arc::clone(store));
                tracing::info!(
                    "Ingestion finished ({:?}): {} records written, {} batches failed",
                    report.outcome,
                    report.records_written,
                    report.failed_batches.len()
                );
            }
            None => tracing::error!("Ingestion produced no vector store ({:?})", report.outcome),
        }

        report
    }

    /// Open the on-disk store without re-embedding. `Ok(false)` when there
    /// is no store directory.
    pub async fn open_store(&self) -> Result<bool> {
        Ok(self.open_existing().await?.is_some())
    }

    async fn open_existing(&self) -> Result<Option<Arc<VectorStore>>> {
        let paths = self.config.paths.clone();
        let model = self.embedder.model().to_string();

        let opened = tokio::task::spawn_blocking(move || -> Result<Option<(VectorStore, usize)>> {
            if !VectorStore::exists(&paths.db_dir) {
                return Ok(None);
            }
            let store = match VectorStore::open(&paths.db_dir, &paths.collection) {
                Ok(store) => store,
                // a directory without a collection in it is treated as absent
                Err(Error::StoreNotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            store.ensure_model(&model)?;
            let records = store.len()?;
            Ok(Some((store, records)))
        })
        .await??;

        let Some((store, records)) = opened else {
            return Ok(None);
        };

        let store = Arc::new(store);
        tracing::info!(
            "Opened collection '{}' at {} ({} records)",
            self.config.paths.collection,
            self.config.paths.db_dir.display(),
            records
        );
        *self.state.write() = ServiceState::StoreOpen(Arc::clone(&store));
        Ok(Some(store))
    }

    /// Retriever over the open store, opening the on-disk store if needed.
    /// `None` when no store exists.
    pub async fn get_retriever(&self) -> Option<Retriever> {
        let current = self.state.read().store();
        let store = match current {
            Some(store) => Some(store),
            None => match self.open_existing().await {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!("Failed to open vector store: {}", e);
                    None
                }
            },
        };

        match store {
            Some(store) => Some(Retriever::new(
                Arc::clone(&self.embedder),
                store,
                self.config.retrieval.top_k,
            )),
            None => {
                tracing::warn!("No vector store available; ingest documents first");
                None
            }
        }
    }

    /// Build (or return) the answer chain over the open store
    pub async fn build_chain(&self) -> Option<Arc<AnswerChain>> {
        let current = self.state.read().chain();
        if let Some(chain) = current {
            return Some(chain);
        }

        let retriever = self.get_retriever().await?;
        let store = Arc::clone(retriever.store());
        let chain = Arc::new(AnswerChain::new(retriever, Arc::clone(&self.llm)));
        *self.state.write() = ServiceState::ChainReady(store, Arc::clone(&chain));

        tracing::info!("Answer chain ready (model: {})", self.llm.model());
        Some(chain)
    }

    /// Answer a question from the documents
    ///
    /// A blank question is a caller error. Without a store the fixed
    /// "no database" message is returned and no provider is called.
    pub async fn ask(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".into()));
        }

        let chain = match self.state() {
            ServiceState::ChainReady(_, chain) => chain,
            ServiceState::StoreOpen(_) => {
                tracing::info!("Store is open without an answer chain; building it now");
                match self.build_chain().await {
                    Some(chain) => chain,
                    None => return Ok(fallback::NO_DATABASE.to_string()),
                }
            }
            ServiceState::Uninitialized => match self.build_chain().await {
                Some(chain) => chain,
                None => {
                    tracing::warn!("Question received but no vector store exists");
                    return Ok(fallback::NO_DATABASE.to_string());
                }
            },
        };

        Ok(chain.respond(question).await)
    }

    /// Startup sequence: reuse the store on disk or ingest the document
    /// directory, then build the answer chain
    pub async fn bootstrap(&self) -> ServiceStatus {
        let db_dir = &self.config.paths.db_dir;
        let reuse = self.config.ingest.on_existing == ExistingStorePolicy::Reuse;

        if VectorStore::exists(db_dir) && reuse {
            tracing::info!("Loading existing vector store from {}", db_dir.display());
            if let Err(e) = self.open_store().await {
                tracing::error!("Failed to load vector store: {}", e);
            }
        } else {
            tracing::info!(
                "Ingesting documents from {}",
                self.config.paths.data_dir.display()
            );
            let report = self.load_and_embed().await;
            if report.outcome == IngestOutcome::EmptyCorpus {
                tracing::warn!("Starting without a document database");
            }
        }

        if self.build_chain().await.is_none() {
            tracing::warn!("Answer chain not built; questions get the fallback message");
        }

        self.status().await
    }

    pub async fn status(&self) -> ServiceStatus {
        let state = self.state();
        let records = match state.store() {
            Some(store) => tokio::task::spawn_blocking(move || store.len().ok())
                .await
                .ok()
                .flatten(),
            None => None,
        };
        ServiceStatus {
            state: state.name(),
            ready: matches!(state, ServiceState::ChainReady(..)),
            collection: self.config.paths.collection.clone(),
            records,
        }
    }

    /// Probe both providers concurrently; a probe that errors or times out
    /// counts as unreachable
    pub async fn provider_health(&self) -> ProviderHealth {
        let (embedding, llm) = tokio::join!(
            probe("embedding", self.embedder.health_check()),
            probe("llm", self.llm.health_check()),
        );
        ProviderHealth { embedding, llm }
    }
}

async fn probe(provider: &str, check: impl Future<Output = Result<bool>>) -> bool {
    match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check).await {
        Ok(Ok(healthy)) => healthy,
        Ok(Err(e)) => {
            tracing::warn!("{} provider health check failed: {}", provider, e);
            false
        }
        Err(_) => {
            tracing::warn!("{} provider health check timed out", provider);
            false
        }
    }
}

impl std::fmt::Debug for RagService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagService")
            .field("embedder", &self.embedder.name())
            .field("llm", &self.llm.model())
            .field("state", &self.state.read().name())
            .finish()
    }
}
