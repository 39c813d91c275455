//! End-to-end flows through `RagService` with in-process providers

mod common;

use std::sync::Arc;

use chatbot_rag::config::ExistingStorePolicy;
use chatbot_rag::generation::fallback;
use chatbot_rag::ingestion::{DocumentLoader, IngestOutcome, TextChunker};
use chatbot_rag::store::VectorStore;
use chatbot_rag::ProviderErrorKind;

use common::{service, test_config, write_doc, FakeLlm, KeywordEmbedder, Reply};

fn long_markdown(topic: &str, paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Paragraph {} about {}. It repeats a few sentences so the chunker has work to do. \
                 Every sentence mentions the topic {} once more.",
                i, topic, topic
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[tokio::test]
async fn record_count_matches_chunk_count() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_doc(&config, "a.md", &long_markdown("rust", 40));
    write_doc(&config, "b.md", "# Short\n\nParis is the capital of France.");
    write_doc(&config, "ignored.txt", "not loaded");

    let documents = DocumentLoader::new().load_directory(&config.paths.data_dir);
    let expected = TextChunker::from_config(&config.chunking).split(&documents).len();
    assert!(expected > 2);

    let service = service(config, KeywordEmbedder::new(), FakeLlm::text("ok"));
    let report = service.load_and_embed().await;

    assert_eq!(report.outcome, IngestOutcome::Created);
    assert_eq!(report.chunks, expected);
    assert_eq!(report.store.unwrap().len().unwrap(), expected);
    assert_eq!(service.status().await.state, "store_open");
}

#[tokio::test]
async fn empty_or_missing_directory_leaves_store_absent() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let db_dir = config.paths.db_dir.clone();
    let embedder = KeywordEmbedder::new();
    let llm = FakeLlm::text("unused");

    let service = service(config.clone(), Arc::clone(&embedder), Arc::clone(&llm));
    let report = service.load_and_embed().await;
    assert_eq!(report.outcome, IngestOutcome::EmptyCorpus);

    std::fs::create_dir_all(&config.paths.data_dir).unwrap();
    let report = service.load_and_embed().await;
    assert_eq!(report.outcome, IngestOutcome::EmptyCorpus);

    assert!(!VectorStore::exists(&db_dir));
    assert!(embedder.calls().is_empty());

    let answer = service.ask("What is the capital of France?").await.unwrap();
    assert_eq!(answer, fallback::NO_DATABASE);
    assert_eq!(llm.calls(), 0);
    assert!(embedder.calls().is_empty());
}

#[tokio::test]
async fn answers_from_the_most_similar_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.retrieval.top_k = 1;
    write_doc(&config, "berlin.md", "Berlin is the capital of Germany.");
    write_doc(&config, "paris.md", "Paris is the capital of France.");

    let llm = FakeLlm::new(Reply::EchoContext);
    let service = service(config, KeywordEmbedder::new(), Arc::clone(&llm));

    let status = service.bootstrap().await;
    assert!(status.ready);
    assert_eq!(status.records, Some(2));

    let answer = service.ask("What is the capital of France?").await.unwrap();

    assert_eq!(answer, "Paris is the capital of France.");
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn auth_failure_returns_fixed_message() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_doc(&config, "paris.md", "Paris is the capital of France.");

    let llm = FakeLlm::new(Reply::Fail(
        ProviderErrorKind::Auth,
        "HTTP 401 - Incorrect API key provided: sk-live-123".to_string(),
    ));
    let service = service(config, KeywordEmbedder::new(), llm);
    service.bootstrap().await;

    let answer = service.ask("What is the capital of France?").await.unwrap();

    assert_eq!(answer, fallback::AUTH_FAILURE);
    assert!(!answer.contains("sk-live-123"));
}

#[tokio::test]
async fn other_failures_include_an_excerpt() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_doc(&config, "paris.md", "Paris is the capital of France.");

    let llm = FakeLlm::new(Reply::Fail(
        ProviderErrorKind::Other,
        format!("HTTP 500 - {}", "overloaded ".repeat(30)),
    ));
    let service = service(config, KeywordEmbedder::new(), llm);
    service.bootstrap().await;

    let answer = service.ask("capital of France?").await.unwrap();

    assert!(answer.starts_with(fallback::GENERIC_FAILURE_PREFIX));
    assert!(answer.contains("HTTP 500"));
    assert_eq!(
        answer.chars().count(),
        fallback::GENERIC_FAILURE_PREFIX.chars().count() + fallback::ERROR_EXCERPT_CHARS
    );
}

#[tokio::test]
async fn two_hundred_fifty_chunks_embed_in_three_calls() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    for i in 0..250 {
        write_doc(
            &config,
            &format!("doc{:03}.md", i),
            &format!("Document {} covers topic number {}.", i, i),
        );
    }

    let embedder = KeywordEmbedder::new();
    let service = service(config, Arc::clone(&embedder), FakeLlm::text("ok"));
    let report = service.load_and_embed().await;

    assert_eq!(embedder.calls(), vec![100, 100, 50]);
    assert_eq!(report.batches, 3);
    assert_eq!(report.records_written, 250);
}

#[tokio::test]
async fn partial_store_is_queryable() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_doc(&config, "000-paris.md", "Paris is the capital of France.");
    for i in 1..250 {
        write_doc(
            &config,
            &format!("doc{:03}.md", i),
            &format!("Document {} covers topic number {}.", i, i),
        );
    }

    let embedder = KeywordEmbedder::failing_on(vec![1, 2]);
    let llm = FakeLlm::new(Reply::EchoContext);
    let service = service(config, Arc::clone(&embedder), Arc::clone(&llm));

    let report = service.load_and_embed().await;
    assert_eq!(report.failed_batches, vec![1, 2]);
    assert_eq!(report.records_written, 100);

    let answer = service.ask("What is the capital of France?").await.unwrap();
    assert!(answer.starts_with("Paris is the capital of France."));
}

#[tokio::test]
async fn store_survives_an_interrupted_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_doc(&config, "000-paris.md", "Paris is the capital of France.");
    for i in 1..250 {
        write_doc(
            &config,
            &format!("doc{:03}.md", i),
            &format!("Document {} covers topic number {}.", i, i),
        );
    }

    // the second embedding call never returns, so only batch 0 is committed
    let embedder = KeywordEmbedder::stalling_on(1);
    let first = Arc::new(service(
        config.clone(),
        Arc::clone(&embedder),
        FakeLlm::text("unused"),
    ));
    let ingest = tokio::spawn({
        let first = Arc::clone(&first);
        async move { first.load_and_embed().await }
    });

    embedder.wait_for_stall().await;
    ingest.abort();
    assert!(ingest.await.unwrap_err().is_cancelled());
    drop(first);

    let llm = FakeLlm::new(Reply::EchoContext);
    let reopened = service(config, KeywordEmbedder::new(), Arc::clone(&llm));
    let status = reopened.bootstrap().await;

    assert!(status.ready);
    assert_eq!(status.records, Some(100));
    let answer = reopened.ask("What is the capital of France?").await.unwrap();
    assert!(answer.starts_with("Paris is the capital of France."));
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn existing_store_is_reused_without_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_doc(&config, "paris.md", "Paris is the capital of France.");

    let first = service(config.clone(), KeywordEmbedder::new(), FakeLlm::text("ok"));
    assert_eq!(first.load_and_embed().await.outcome, IngestOutcome::Created);
    drop(first);

    write_doc(&config, "berlin.md", "Berlin is the capital of Germany.");
    let embedder = KeywordEmbedder::new();
    let second = service(config, Arc::clone(&embedder), FakeLlm::text("Paris."));

    let status = second.bootstrap().await;

    assert!(status.ready);
    assert_eq!(status.records, Some(1));
    assert!(embedder.calls().is_empty());
    assert_eq!(second.ask("capital of France?").await.unwrap(), "Paris.");
}

#[tokio::test]
async fn append_and_rebuild_policies() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    write_doc(&config, "paris.md", "Paris is the capital of France.");

    let first = service(config.clone(), KeywordEmbedder::new(), FakeLlm::text("ok"));
    first.load_and_embed().await;
    drop(first);

    write_doc(&config, "berlin.md", "Berlin is the capital of Germany.");

    config.ingest.on_existing = ExistingStorePolicy::Append;
    let appending = service(config.clone(), KeywordEmbedder::new(), FakeLlm::text("ok"));
    let report = appending.load_and_embed().await;
    assert_eq!(report.outcome, IngestOutcome::Appended);
    // paris.md is unchanged, so only berlin.md adds a record
    assert_eq!(report.records_written, 1);
    assert_eq!(report.store.unwrap().len().unwrap(), 2);
    drop(appending);

    std::fs::remove_file(config.paths.data_dir.join("paris.md")).unwrap();
    config.ingest.on_existing = ExistingStorePolicy::Rebuild;
    let rebuilding = service(config, KeywordEmbedder::new(), FakeLlm::text("ok"));
    let report = rebuilding.load_and_embed().await;
    assert_eq!(report.outcome, IngestOutcome::Created);
    assert_eq!(report.store.unwrap().len().unwrap(), 1);
}

#[tokio::test]
async fn concurrent_questions_share_one_chain() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    write_doc(&config, "paris.md", "Paris is the capital of France.");

    let llm = FakeLlm::text("Paris.");
    let service = Arc::new(service(config, KeywordEmbedder::new(), Arc::clone(&llm)));
    service.bootstrap().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.ask("capital of France?").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "Paris.");
    }
    assert_eq!(llm.calls(), 8);
}
