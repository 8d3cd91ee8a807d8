//! Chat handlers
//!
//! History is supplied by the caller on every request; nothing is persisted.

use axum::{extract::State, Json};
use pitwall_common::{errors::Result, llm::ChatMessage};
use pitwall_search::{Answer, RetrievalMode, SourceCitation};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use super::validation_error;
use crate::AppState;

/// Chat request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,

    #[serde(default)]
    #[validate(length(max = 100))]
    pub history: Vec<ChatMessage>,
}

/// Chat response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub sources: Vec<SourceCitation>,
    pub cited: Vec<usize>,
    pub mode: RetrievalMode,
    pub processing_time_ms: u64,
}

/// Answer a question grounded in the document corpus
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();
    request.validate().map_err(validation_error)?;

    let Answer {
        content,
        sources,
        cited,
        mode,
    } = state.synthesizer.answer(&request.message, &request.history).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        sources = sources.len(),
        cited = cited.len(),
        latency_ms = processing_time_ms,
        "Chat answered"
    );

    Ok(Json(ChatResponse {
        message: ChatMessage::assistant(content),
        sources,
        cited,
        mode,
        processing_time_ms,
    }))
}
