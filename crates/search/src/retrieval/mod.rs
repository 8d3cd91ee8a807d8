//! Hybrid retrieval system
//!
//! Provides the stages of the retrieval pipeline:
//! - BM25 keyword scoring over chunk text
//! - Vector similarity against stored chunk embeddings
//! - LLM query expansion (paraphrases widen vector recall)
//! - Weighted score fusion with a metadata keyword boost
//! - The orchestrator that sequences them with graceful degradation

mod bm25;
mod expansion;
mod fusion;
mod hybrid;
mod vector;

pub use bm25::Bm25Scorer;
pub use expansion::QueryExpander;
pub use fusion::WeightedFusion;
pub use hybrid::HybridRetriever;
pub use vector::{cosine_similarity, VectorScorer};

use pitwall_common::db::models::{Chunk, ChunkMetadata};
use pitwall_common::errors::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retrieved chunk with relevance scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk ID
    pub id: Uuid,

    /// Document this chunk belongs to
    pub document_id: Uuid,

    /// Chunk content
    pub content: String,

    /// Metadata copied from the chunk
    pub metadata: ChunkMetadata,

    /// Normalized vector similarity (0.0 - 1.0)
    pub vector_score: f32,

    /// Normalized BM25 score (0.0 - 1.0)
    pub bm25_score: f32,

    /// Fused, boosted and capped score (0.0 - 1.0)
    pub combined_score: f32,
}

impl RetrievedChunk {
    /// Build a result from a stored chunk
    pub fn from_chunk(
        chunk: &Chunk,
        vector_score: f32,
        bm25_score: f32,
        combined_score: f32,
    ) -> Self {
        Self {
            id: chunk.id,
            document_id: chunk.document_id,
            content: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
            vector_score,
            bm25_score,
            combined_score,
        }
    }
}

/// Signals that contributed to a ranking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Vector and keyword scores fused
    Hybrid,
    /// Keyword scores only (no embeddings, or vector stage degraded)
    KeywordOnly,
    /// Nothing to search
    EmptyCorpus,
}

impl RetrievalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetrievalMode::Hybrid => "hybrid",
            RetrievalMode::KeywordOnly => "keyword_only",
            RetrievalMode::EmptyCorpus => "empty_corpus",
        }
    }
}

/// Outcome of one optional pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage ran and its output was used
    Succeeded,
    /// Stage was not attempted
    Skipped { reason: String },
    /// Stage failed and the pipeline fell back
    Degraded { reason: String },
}

impl StageStatus {
    pub fn skipped(reason: impl Into<String>) -> Self {
        StageStatus::Skipped { reason: reason.into() }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        StageStatus::Degraded { reason: reason.into() }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageStatus::Degraded { .. })
    }
}

/// Ranked chunks plus how each stage fared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub chunks: Vec<RetrievedChunk>,
    pub mode: RetrievalMode,
    /// Queries used for vector search, original first
    pub query_variants: Vec<String>,
    pub expansion: StageStatus,
    pub vector: StageStatus,
}

/// Common trait for retrievers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve up to `top_k` chunks with a per-stage report
    async fn retrieve_with_report(&self, query: &str, top_k: usize) -> Result<RetrievalReport>;

    /// Retrieve up to `top_k` chunks ranked by combined score
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        Ok(self.retrieve_with_report(query, top_k).await?.chunks)
    }
}
