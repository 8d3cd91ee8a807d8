//! Document management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use pitwall_common::{
    db::models::{Document, DocumentType, NewDocument},
    errors::{AppError, Result},
};
use pitwall_ingestion::EmbeddingSummary;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validation_error;
use crate::AppState;

/// Request to create and ingest a document
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDocumentRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,

    #[validate(length(min = 1, max = 1000000))]
    pub content: String,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    #[validate(length(max = 200))]
    pub source: Option<String>,

    #[validate(length(max = 2000))]
    pub url: Option<String>,
}

/// Document summary returned by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub source: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DocumentResponse {
    fn new(document: Document, chunk_count: usize, include_content: bool) -> Self {
        Self {
            id: document.id,
            title: document.title,
            doc_type: document.doc_type,
            source: document.source,
            url: document.url,
            created_at: document.created_at,
            chunk_count,
            content: include_content.then_some(document.content),
        }
    }
}

/// Response after ingesting a document
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateDocumentResponse {
    pub document: DocumentResponse,
    pub chunks_embedded: usize,
    pub embedding_failures: usize,
}

/// Create a document, chunk it and embed the chunks
pub async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<CreateDocumentResponse>)> {
    request.validate().map_err(validation_error)?;

    let mut new_document = NewDocument::new(request.title, request.content, request.doc_type);
    if let Some(source) = request.source {
        new_document = new_document.with_source(source);
    }
    if let Some(url) = request.url {
        new_document = new_document.with_url(url);
    }

    let report = state.processor.ingest(new_document).await?;

    tracing::info!(
        document_id = %report.document.id,
        chunks = report.chunks_created,
        embedded = report.chunks_embedded,
        "Document created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateDocumentResponse {
            document: DocumentResponse::new(report.document, report.chunks_created, false),
            chunks_embedded: report.chunks_embedded,
            embedding_failures: report.embedding_failures,
        }),
    ))
}

/// List all documents
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<DocumentResponse>>> {
    let documents = state.repository.list_documents().await?;

    let mut responses = Vec::with_capacity(documents.len());
    for document in documents {
        let chunk_count = state.repository.count_chunks_for_document(document.id).await?;
        responses.push(DocumentResponse::new(document, chunk_count, false));
    }

    Ok(Json(responses))
}

/// Get a document with its content and chunk count
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>> {
    let document = state
        .repository
        .get_document(id)
        .await?
        .ok_or_else(|| AppError::DocumentNotFound { id: id.to_string() })?;

    let chunk_count = state.repository.count_chunks_for_document(id).await?;
    Ok(Json(DocumentResponse::new(document, chunk_count, true)))
}

/// Delete a document and its chunks
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.processor.delete_document(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Embed chunks that were stored without an embedding
pub async fn embed_missing(State(state): State<AppState>) -> Result<Json<EmbeddingSummary>> {
    let summary = state.processor.embed_missing().await?;
    Ok(Json(summary))
}
