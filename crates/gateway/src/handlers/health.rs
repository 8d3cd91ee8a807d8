//! Health check handlers

use axum::{extract::State, Json};
use pitwall_common::errors::Result;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents: usize,
    pub chunks: usize,
    pub embedded_chunks: usize,
}

/// Liveness probe with corpus counts
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let documents = state.repository.list_documents().await?.len();
    let chunks = state.repository.list_chunks().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: pitwall_common::VERSION.to_string(),
        documents,
        chunks: chunks.len(),
        embedded_chunks: chunks.iter().filter(|c| c.has_embedding()).count(),
    }))
}
