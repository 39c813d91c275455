//! RAG Server binary
//!
//! Run with: cargo run -p chatbot-rag --bin chatbot-rag-server

use chatbot_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbot_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                       Chatbot RAG                         ║
║          Answers from your Markdown and PDF files         ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Load configuration
    let config = RagConfig::load(None)?;

    tracing::info!("Configuration loaded");
    tracing::info!(
        "  - Provider: {:?} at {}",
        config.llm.provider,
        config.llm.effective_base_url()
    );
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);
    tracing::info!("  - Documents: {}", config.paths.data_dir.display());
    tracing::info!("  - Vector store: {}", config.paths.db_dir.display());

    let server = RagServer::new(config)?;

    // Build or load the document database before accepting requests
    let status = server.bootstrap().await;
    if status.ready {
        tracing::info!(
            "Document database ready ({} records)",
            status.records.unwrap_or_default()
        );
    } else {
        tracing::warn!("Serving without a document database (state: {})", status.state);
    }

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /chat   - Ask a question");
    println!("  GET  /ready  - Readiness");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
