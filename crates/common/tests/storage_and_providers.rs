//! Shared repository under concurrent writers, and provider retries

use pitwall_common::db::models::{ChunkMetadata, DocumentType, NewChunk, NewDocument};
use pitwall_common::db::{MemoryRepository, Repository};
use pitwall_common::embeddings::{Embedder, MockEmbedder};
use pitwall_common::errors::AppError;
use pitwall_common::retry::{retry_on_rate_limit, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn new_chunk(document_id: Uuid, index: usize) -> NewChunk {
    let content = format!("Stint {} on the medium compound.", index);
    NewChunk {
        document_id,
        chunk_index: index,
        metadata: ChunkMetadata {
            document_title: "Race log".to_string(),
            document_type: DocumentType::Performance,
            source: None,
            start_position: 0,
            end_position: content.len(),
            keywords: vec!["medium".to_string()],
        },
        content,
    }
}

#[tokio::test]
async fn test_concurrent_chunk_writes() {
    let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let document = repository
        .create_document(NewDocument::new("Race log", "Stints.", DocumentType::Performance))
        .await
        .unwrap();
    let document_id = document.id;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repository = repository.clone();
            tokio::spawn(async move { repository.create_chunk(new_chunk(document_id, i)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let chunks = repository.get_chunks_for_document(document_id).await.unwrap();
    assert_eq!(chunks.len(), 16);
    assert_eq!(repository.count_chunks_for_document(document_id).await.unwrap(), 16);

    let mut indices: Vec<_> = chunks.iter().map(|c| c.chunk_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..16).collect::<Vec<_>>());

    // Corpus scans repeat in the same order
    let first: Vec<_> = repository.list_chunks().await.unwrap().iter().map(|c| c.id).collect();
    let second: Vec<_> = repository.list_chunks().await.unwrap().iter().map(|c| c.id).collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_chunk_for_missing_document_rejected() {
    let repository = MemoryRepository::new();
    let orphan = new_chunk(Uuid::new_v4(), 0);
    let err = tokio_test::assert_err!(repository.create_chunk(orphan).await);
    assert!(matches!(err, AppError::DocumentNotFound { .. }));
}

#[tokio::test]
async fn test_embedding_survives_two_rate_limits() {
    let embedder = MockEmbedder::new(32).rate_limited_for(2);
    let policy = RetryPolicy::new(3, Duration::ZERO);

    let embedding = tokio_test::assert_ok!(
        retry_on_rate_limit(&policy, "embed", || embedder.embed("pit window")).await
    );

    assert_eq!(embedding.len(), 32);
    assert_eq!(embedder.calls(), 3);
}

#[tokio::test]
async fn test_embedding_gives_up_after_three_attempts() {
    let embedder = MockEmbedder::new(32).rate_limited_for(5);
    let policy = RetryPolicy::new(3, Duration::ZERO);

    let result = retry_on_rate_limit(&policy, "embed", || embedder.embed("pit window")).await;

    assert!(matches!(result, Err(AppError::ProviderRateLimited { .. })));
    assert_eq!(embedder.calls(), 3);
}
