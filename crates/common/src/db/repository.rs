//! Repository pattern for storage operations
//!
//! The retrieval core only talks to storage through this trait, so the
//! in-memory implementation can be swapped for a database without changing
//! ingestion or search code.

use crate::db::models::{Chunk, Document, NewChunk, NewDocument};
use crate::errors::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Storage operations consumed by ingestion and retrieval
#[async_trait]
pub trait Repository: Send + Sync {
    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Create a document, assigning an id and creation timestamp
    async fn create_document(&self, document: NewDocument) -> Result<Document>;

    /// Find a document by id
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// All documents in creation order
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Delete a document and every chunk it owns.
    /// Returns `false` when no such document existed.
    async fn delete_document(&self, id: Uuid) -> Result<bool>;

    // ========================================================================
    // Chunk Operations
    // ========================================================================

    /// Persist a chunk, assigning an id
    async fn create_chunk(&self, chunk: NewChunk) -> Result<Chunk>;

    /// Every chunk in the corpus, in a stable insertion order
    async fn list_chunks(&self) -> Result<Vec<Chunk>>;

    /// Chunks of one document ordered by `chunk_index`
    async fn get_chunks_for_document(&self, document_id: Uuid) -> Result<Vec<Chunk>>;

    /// Number of chunks owned by a document
    async fn count_chunks_for_document(&self, document_id: Uuid) -> Result<usize> {
        Ok(self.get_chunks_for_document(document_id).await?.len())
    }

    /// Attach (or replace) a chunk's embedding. Last writer wins.
    async fn set_chunk_embedding(&self, chunk_id: Uuid, embedding: Vec<f32>) -> Result<()>;
}
