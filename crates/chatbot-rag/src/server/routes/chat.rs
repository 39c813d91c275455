//! Chat endpoint

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::generation::fallback;
use crate::server::state::AppState;
use crate::types::{ChatRequest, ChatResponse};

/// POST /chat - answer a question from the documents
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    if request.is_blank() {
        return Err(Error::InvalidRequest("question must not be empty".to_string()));
    }

    tracing::info!("Question: \"{}\"", request.question);

    let answer = state.service().ask(&request.question).await?;
    let answer = if answer.trim().is_empty() {
        fallback::EMPTY_ANSWER.to_string()
    } else {
        answer
    };

    Ok(Json(ChatResponse { answer }))
}
