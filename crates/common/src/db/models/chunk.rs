//! Chunk entity

use super::DocumentType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retrieval metadata captured when a chunk is cut from its document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_title: String,

    pub document_type: DocumentType,

    pub source: Option<String>,

    /// Byte offset of the chunk start in the document content
    pub start_position: usize,

    /// Byte offset one past the chunk end in the document content.
    /// May exceed the next chunk's `start_position` because of overlap.
    pub end_position: usize,

    /// Vocabulary terms found in the chunk, at most 10
    pub keywords: Vec<String>,
}

/// A stored chunk of a document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,

    pub document_id: Uuid,

    pub content: String,

    /// 0-based position within the document, in text order
    pub chunk_index: usize,

    /// Embedding vector; `None` until the ingestion step attaches one
    pub embedding: Option<Vec<f32>>,

    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Whether a usable (non-empty) embedding is stored
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// Chunk produced by the chunker, before an id is assigned
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewChunk {
    pub document_id: Uuid,

    pub content: String,

    pub chunk_index: usize,

    pub metadata: ChunkMetadata,
}
