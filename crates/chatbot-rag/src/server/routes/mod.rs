//! API routes for the RAG server

pub mod chat;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::server::state::AppState;

/// Question answering and service info routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(info))
        .route("/chat", post(chat::chat))
}

/// Service info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.config();
    Json(json!({
        "name": "chatbot-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "collection": config.paths.collection,
        "models": {
            "embedding": config.embeddings.model,
            "generation": config.llm.generate_model,
        },
        "description": "Answers questions from a local directory of Markdown and PDF documents",
        "endpoints": {
            "POST /chat": "Ask a question: {\"question\": \"...\"} -> {\"answer\": \"...\"}",
            "GET /health": "Liveness check",
            "GET /ready": "Readiness of the document database and answer chain",
            "GET /ui": "Web frontend (when configured)"
        }
    }))
}
