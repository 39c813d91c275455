//! Fake providers and fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use chatbot_rag::error::{Error, ProviderErrorKind, Result};
use chatbot_rag::providers::{EmbeddingProvider, LlmProvider};
use chatbot_rag::{RagConfig, RagService};

const VOCAB: [&str; 8] = [
    "paris", "berlin", "france", "germany", "capital", "document", "topic", "rust",
];

/// Term counts over a small fixed vocabulary. Records every batch size,
/// fails the calls listed in `fail_calls` and never returns from call
/// `stall_on`.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: Mutex<Vec<usize>>,
    fail_calls: Vec<usize>,
    stall_on: Option<usize>,
    stalled: Notify,
}

impl KeywordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(fail_calls: Vec<usize>) -> Arc<Self> {
        Arc::new(Self {
            fail_calls,
            ..Self::default()
        })
    }

    pub fn stalling_on(call: usize) -> Arc<Self> {
        Arc::new(Self {
            stall_on: Some(call),
            ..Self::default()
        })
    }

    /// Resolves once the stalling call has started
    pub async fn wait_for_stall(&self) {
        self.stalled.notified().await;
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = VOCAB
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        // keeps texts without vocabulary words off the zero vector
        vector.push(0.1);
        vector
    }

    /// Sizes of every `embed_batch` call so far
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(texts.len());
            calls.len() - 1
        };
        if self.stall_on == Some(call) {
            self.stalled.notify_one();
            std::future::pending::<()>().await;
        }
        if self.fail_calls.contains(&call) {
            return Err(Error::embedding(ProviderErrorKind::Other, "HTTP 429 - rate limited"));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// What the fake generation model does
#[derive(Clone)]
pub enum Reply {
    /// Return this text
    Text(String),
    /// Return the context section of the prompt
    EchoContext,
    /// Fail with this kind
    Fail(ProviderErrorKind, String),
}

/// Generation model double counting its calls
pub struct FakeLlm {
    reply: Reply,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn text(answer: &str) -> Arc<Self> {
        Self::new(Reply::Text(answer.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::EchoContext => Ok(prompt
                .split("Context: ")
                .nth(1)
                .and_then(|rest| rest.split("\nAnswer:").next())
                .unwrap_or_default()
                .to_string()),
            Reply::Fail(kind, message) => Err(Error::llm(*kind, message.clone())),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

/// Config rooted in a temp directory with pacing disabled
pub fn test_config(root: &Path) -> RagConfig {
    let mut config = RagConfig::default();
    config.paths.data_dir = root.join("datas");
    config.paths.db_dir = root.join("vector_db");
    config.ingest.batch_delay_ms = 0;
    config
}

/// Write `name` with `content` into the data directory
pub fn write_doc(config: &RagConfig, name: &str, content: &str) {
    std::fs::create_dir_all(&config.paths.data_dir).unwrap();
    std::fs::write(config.paths.data_dir.join(name), content).unwrap();
}

pub fn service(
    config: RagConfig,
    embedder: Arc<KeywordEmbedder>,
    llm: Arc<FakeLlm>,
) -> RagService {
    RagService::new(config, embedder, llm)
}
