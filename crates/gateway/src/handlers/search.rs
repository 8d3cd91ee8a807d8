//! Search handlers

use axum::{extract::State, Json};
use pitwall_common::errors::Result;
use pitwall_search::{RetrievalMode, RetrievedChunk, Retriever, StageStatus};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use super::validation_error;
use crate::AppState;

/// Search request
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 1000))]
    pub query: String,

    /// Maximum results to return (defaults to the configured top-K)
    #[validate(range(min = 1, max = 50))]
    pub top_k: Option<usize>,
}

/// Search response
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: RetrievalMode,
    pub total_results: usize,
    pub results: Vec<RetrievedChunk>,
    pub query_variants: Vec<String>,
    pub expansion: StageStatus,
    pub vector: StageStatus,
    pub processing_time_ms: u64,
}

/// Perform a hybrid search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();
    request.validate().map_err(validation_error)?;

    let top_k = request.top_k.unwrap_or(state.config.retrieval.top_k);
    let report = state.retriever.retrieve_with_report(&request.query, top_k).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        mode = report.mode.as_str(),
        results = report.chunks.len(),
        latency_ms = processing_time_ms,
        "Search completed"
    );

    Ok(Json(SearchResponse {
        query: request.query,
        mode: report.mode,
        total_results: report.chunks.len(),
        results: report.chunks,
        query_variants: report.query_variants,
        expansion: report.expansion,
        vector: report.vector,
        processing_time_ms,
    }))
}
