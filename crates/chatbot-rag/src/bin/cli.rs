//! Command-line front end: interactive chat, one-shot questions and ingestion
//!
//! Run with: cargo run -p chatbot-rag --features cli --bin chatbot-rag-cli -- chat

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatbot_rag::config::{ExistingStorePolicy, RagConfig};
use chatbot_rag::ingestion::IngestOutcome;
use chatbot_rag::RagService;

#[derive(Parser)]
#[command(name = "chatbot-rag-cli")]
#[command(about = "Ask questions about a directory of Markdown and PDF files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (overrides CHATBOT_RAG_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop; type `exit` to quit
    Chat,
    /// Answer a single question
    Ask {
        /// The question
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Embed the document directory into the vector store
    Ingest {
        /// Delete the existing store first
        #[arg(long, conflicts_with = "append")]
        rebuild: bool,
        /// Append to the existing store
        #[arg(long)]
        append: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbot_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = RagConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Chat => {
            let service = RagService::from_config(config)?;
            service.bootstrap().await;
            chat_loop(&service).await?;
        }
        Commands::Ask { question } => {
            let service = RagService::from_config(config)?;
            service.bootstrap().await;
            let answer = service.ask(&question.join(" ")).await?;
            println!("{}", answer);
        }
        Commands::Ingest { rebuild, append } => {
            if rebuild {
                config.ingest.on_existing = ExistingStorePolicy::Rebuild;
            } else if append {
                config.ingest.on_existing = ExistingStorePolicy::Append;
            }
            let service = RagService::from_config(config)?;
            let report = service.load_and_embed().await;

            println!("Outcome:         {:?}", report.outcome);
            println!("Chunks:          {}", report.chunks);
            println!("Batches:         {}", report.batches);
            println!("Failed batches:  {:?}", report.failed_batches);
            println!("Records written: {}", report.records_written);

            if matches!(
                report.outcome,
                IngestOutcome::AllBatchesFailed | IngestOutcome::OpenFailed
            ) {
                anyhow::bail!("ingestion did not produce a usable vector store");
            }
        }
    }

    Ok(())
}

async fn chat_loop(service: &RagService) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Ask a question about the documents (type 'exit' to quit).");
    loop {
        stdout.write_all(b"\nQuestion: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let answer = service.ask(question).await?;
        println!("Answer: {}", answer);
    }

    println!("Bye.");
    Ok(())
}
