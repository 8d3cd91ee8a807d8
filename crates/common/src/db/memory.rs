//! In-memory repository
//!
//! Id-indexed maps behind a `tokio::sync::RwLock`, plus a secondary
//! `document_id -> chunk ids` index maintained on every write. Insertion
//! order is tracked separately so corpus scans are deterministic.

use crate::db::models::{Chunk, Document, NewChunk, NewDocument};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    documents: HashMap<Uuid, Document>,
    document_order: Vec<Uuid>,
    chunks: HashMap<Uuid, Chunk>,
    chunk_order: Vec<Uuid>,
    chunks_by_document: HashMap<Uuid, Vec<Uuid>>,
}

/// Repository backed by process memory
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_document(&self, document: NewDocument) -> Result<Document> {
        let document = Document {
            id: Uuid::new_v4(),
            title: document.title,
            content: document.content,
            doc_type: document.doc_type,
            source: document.source,
            url: document.url,
            created_at: chrono::Utc::now(),
        };

        let mut tables = self.tables.write().await;
        tables.document_order.push(document.id);
        tables.chunks_by_document.insert(document.id, Vec::new());
        tables.documents.insert(document.id, document.clone());

        Ok(document)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.tables.read().await.documents.get(&id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let tables = self.tables.read().await;
        Ok(tables
            .document_order
            .iter()
            .filter_map(|id| tables.documents.get(id).cloned())
            .collect())
    }

    async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;

        if tables.documents.remove(&id).is_none() {
            return Ok(false);
        }
        tables.document_order.retain(|doc_id| *doc_id != id);

        let owned = tables.chunks_by_document.remove(&id).unwrap_or_default();
        for chunk_id in &owned {
            tables.chunks.remove(chunk_id);
        }
        tables.chunk_order.retain(|chunk_id| !owned.contains(chunk_id));

        debug!(document_id = %id, chunks_removed = owned.len(), "Document deleted");
        Ok(true)
    }

    async fn create_chunk(&self, chunk: NewChunk) -> Result<Chunk> {
        let mut tables = self.tables.write().await;

        if !tables.documents.contains_key(&chunk.document_id) {
            return Err(AppError::DocumentNotFound {
                id: chunk.document_id.to_string(),
            });
        }

        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: chunk.document_id,
            content: chunk.content,
            chunk_index: chunk.chunk_index,
            embedding: None,
            metadata: chunk.metadata,
        };

        tables.chunk_order.push(chunk.id);
        tables
            .chunks_by_document
            .entry(chunk.document_id)
            .or_default()
            .push(chunk.id);
        tables.chunks.insert(chunk.id, chunk.clone());

        Ok(chunk)
    }

    async fn list_chunks(&self) -> Result<Vec<Chunk>> {
        let tables = self.tables.read().await;
        Ok(tables
            .chunk_order
            .iter()
            .filter_map(|id| tables.chunks.get(id).cloned())
            .collect())
    }

    async fn get_chunks_for_document(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let tables = self.tables.read().await;
        let mut chunks: Vec<Chunk> = tables
            .chunks_by_document
            .get(&document_id)
            .map(|ids| ids.iter().filter_map(|id| tables.chunks.get(id).cloned()).collect())
            .unwrap_or_default();

        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn count_chunks_for_document(&self, document_id: Uuid) -> Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables
            .chunks_by_document
            .get(&document_id)
            .map(Vec::len)
            .unwrap_or(0))
    }

    async fn set_chunk_embedding(&self, chunk_id: Uuid, embedding: Vec<f32>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let chunk = tables
            .chunks
            .get_mut(&chunk_id)
            .ok_or_else(|| AppError::ChunkNotFound {
                id: chunk_id.to_string(),
            })?;

        chunk.embedding = Some(embedding);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ChunkMetadata, DocumentType};

    fn new_chunk(document_id: Uuid, index: usize, content: &str) -> NewChunk {
        NewChunk {
            document_id,
            content: content.to_string(),
            chunk_index: index,
            metadata: ChunkMetadata {
                document_title: "Monaco preview".to_string(),
                document_type: DocumentType::Analysis,
                source: None,
                start_position: 0,
                end_position: content.len(),
                keywords: vec![],
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_get_document() {
        let repo = MemoryRepository::new();
        let doc = repo
            .create_document(NewDocument::new("Monaco preview", "Text.", DocumentType::Analysis))
            .await
            .unwrap();

        let found = repo.get_document(doc.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Monaco preview");
        assert_eq!(repo.list_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_chunks() {
        let repo = MemoryRepository::new();
        let doc = repo
            .create_document(NewDocument::new("Monaco preview", "Text.", DocumentType::Analysis))
            .await
            .unwrap();
        let other = repo
            .create_document(NewDocument::new("Spa recap", "Text.", DocumentType::News))
            .await
            .unwrap();

        repo.create_chunk(new_chunk(doc.id, 0, "first")).await.unwrap();
        repo.create_chunk(new_chunk(doc.id, 1, "second")).await.unwrap();
        repo.create_chunk(new_chunk(other.id, 0, "kept")).await.unwrap();

        assert!(repo.delete_document(doc.id).await.unwrap());
        assert!(repo.get_chunks_for_document(doc.id).await.unwrap().is_empty());
        assert_eq!(repo.count_chunks_for_document(doc.id).await.unwrap(), 0);

        let remaining = repo.list_chunks().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content, "kept");

        assert!(!repo.delete_document(doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_chunk_requires_document() {
        let repo = MemoryRepository::new();
        let result = repo.create_chunk(new_chunk(Uuid::new_v4(), 0, "orphan")).await;
        assert!(matches!(result, Err(AppError::DocumentNotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_chunks_keeps_insertion_order() {
        let repo = MemoryRepository::new();
        let doc = repo
            .create_document(NewDocument::new("Order", "Text.", DocumentType::Rules))
            .await
            .unwrap();

        for (i, text) in ["a", "b", "c", "d"].iter().enumerate() {
            repo.create_chunk(new_chunk(doc.id, i, text)).await.unwrap();
        }

        let contents: Vec<String> = repo
            .list_chunks()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_set_embedding_last_writer_wins() {
        let repo = MemoryRepository::new();
        let doc = repo
            .create_document(NewDocument::new("Embed", "Text.", DocumentType::News))
            .await
            .unwrap();
        let chunk = repo.create_chunk(new_chunk(doc.id, 0, "text")).await.unwrap();
        assert!(!chunk.has_embedding());

        repo.set_chunk_embedding(chunk.id, vec![1.0, 0.0]).await.unwrap();
        repo.set_chunk_embedding(chunk.id, vec![0.0, 1.0]).await.unwrap();

        let stored = repo.get_chunks_for_document(doc.id).await.unwrap();
        assert_eq!(stored[0].embedding, Some(vec![0.0, 1.0]));

        let missing = repo.set_chunk_embedding(Uuid::new_v4(), vec![1.0]).await;
        assert!(matches!(missing, Err(AppError::ChunkNotFound { .. })));
    }
}
