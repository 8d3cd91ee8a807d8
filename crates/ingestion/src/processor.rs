//! Ingestion processor
//!
//! Core logic for ingesting documents: validation, chunking, persistence and
//! concurrent embedding of the resulting chunks.

use crate::chunker::{chunk_document, ChunkingConfig};
use futures::stream::{self, StreamExt};
use pitwall_common::config::AppConfig;
use pitwall_common::db::models::{Chunk, Document, NewDocument};
use pitwall_common::db::Repository;
use pitwall_common::embeddings::Embedder;
use pitwall_common::errors::{AppError, Result};
use pitwall_common::metrics;
use pitwall_common::retry::{retry_on_rate_limit, RetryPolicy};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Maximum accepted document content length in bytes
pub const MAX_CONTENT_BYTES: usize = 1_000_000;

/// Outcome of ingesting one document
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub document: Document,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub embedding_failures: usize,
}

/// Outcome of an embedding pass over a set of chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingSummary {
    pub attempted: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// Ingestion processor
pub struct IngestionProcessor {
    repository: Arc<dyn Repository>,
    embedder: Arc<dyn Embedder>,
    chunking_config: ChunkingConfig,
    retry: RetryPolicy,
    concurrency: usize,
}

impl IngestionProcessor {
    pub fn new(
        repository: Arc<dyn Repository>,
        embedder: Arc<dyn Embedder>,
        chunking_config: ChunkingConfig,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            repository,
            embedder,
            chunking_config,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Build a processor from application configuration
    pub fn from_config(
        repository: Arc<dyn Repository>,
        embedder: Arc<dyn Embedder>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            repository,
            embedder,
            ChunkingConfig::from(&config.retrieval),
            RetryPolicy::from_config(&config.retry),
            config.embedding.concurrency,
        )
    }

    /// Validate, store, chunk and embed a document.
    ///
    /// Embedding failures are counted in the report, never returned: a chunk
    /// without an embedding remains searchable by keyword.
    #[instrument(skip(self, document), fields(title = %document.title))]
    pub async fn ingest(&self, document: NewDocument) -> Result<IngestionReport> {
        let start = Instant::now();
        validate_document(&document)?;

        let document = self.repository.create_document(document).await?;
        let new_chunks = chunk_document(&document, &self.chunking_config);

        let mut chunks = Vec::with_capacity(new_chunks.len());
        for chunk in new_chunks {
            chunks.push(self.repository.create_chunk(chunk).await?);
        }
        let chunks_created = chunks.len();

        info!(
            document_id = %document.id,
            chunk_count = chunks_created,
            "Document chunked"
        );

        let summary = self.embed_chunks(chunks).await;

        metrics::record_ingestion(
            start.elapsed().as_secs_f64(),
            chunks_created,
            document.doc_type.as_str(),
        );

        info!(
            document_id = %document.id,
            chunks_embedded = summary.embedded,
            embedding_failures = summary.failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document ingested"
        );

        Ok(IngestionReport {
            document,
            chunks_created,
            chunks_embedded: summary.embedded,
            embedding_failures: summary.failed,
        })
    }

    /// Embed every stored chunk that has no embedding yet
    #[instrument(skip(self))]
    pub async fn embed_missing(&self) -> Result<EmbeddingSummary> {
        let missing: Vec<Chunk> = self
            .repository
            .list_chunks()
            .await?
            .into_iter()
            .filter(|c| !c.has_embedding())
            .collect();

        if missing.is_empty() {
            debug!("No chunks without embeddings");
            return Ok(EmbeddingSummary::default());
        }

        let summary = self.embed_chunks(missing).await;
        info!(
            attempted = summary.attempted,
            embedded = summary.embedded,
            failed = summary.failed,
            "Embedding backfill complete"
        );
        Ok(summary)
    }

    /// Delete a document and its chunks
    #[instrument(skip(self))]
    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        if self.repository.delete_document(id).await? {
            info!(document_id = %id, "Document deleted");
            Ok(())
        } else {
            Err(AppError::DocumentNotFound { id: id.to_string() })
        }
    }

    /// Embed chunks concurrently; each embedding is written independently.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> EmbeddingSummary {
        let attempted = chunks.len();

        let results: Vec<(Uuid, Result<()>)> = stream::iter(chunks)
            .map(|chunk| async move {
                let outcome = self.embed_one(&chunk).await;
                (chunk.id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = EmbeddingSummary {
            attempted,
            ..Default::default()
        };

        for (chunk_id, outcome) in results {
            match outcome {
                Ok(()) => summary.embedded += 1,
                Err(e) => {
                    warn!(chunk_id = %chunk_id, error = %e, "Chunk embedding failed");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn embed_one(&self, chunk: &Chunk) -> Result<()> {
        let embedding = retry_on_rate_limit(&self.retry, "embed_chunk", || {
            self.embedder.embed(&chunk.content)
        })
        .await?;

        self.repository.set_chunk_embedding(chunk.id, embedding).await
    }
}

fn validate_document(document: &NewDocument) -> Result<()> {
    if document.title.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Title must not be empty".to_string(),
            field: Some("title".to_string()),
        });
    }
    if document.content.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Content must not be empty".to_string(),
            field: Some("content".to_string()),
        });
    }
    if document.content.len() > MAX_CONTENT_BYTES {
        return Err(AppError::PayloadTooLarge {
            size: document.content.len(),
            limit: MAX_CONTENT_BYTES,
        });
    }
    Ok(())
}
