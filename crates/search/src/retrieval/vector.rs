//! Vector similarity search over stored chunk embeddings
//!
//! Provides semantic search via embedding similarity. Only chunks that
//! already carry an embedding are considered.

use super::RetrievedChunk;
use pitwall_common::db::models::Chunk;
use pitwall_common::embeddings::Embedder;
use pitwall_common::errors::Result;
use pitwall_common::retry::{retry_on_rate_limit, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0 for empty or mismatched vectors and when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Vector scorer backed by an embedding provider
pub struct VectorScorer {
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
}

impl VectorScorer {
    /// Create a new vector scorer
    pub fn new(embedder: Arc<dyn Embedder>, retry: RetryPolicy) -> Self {
        Self { embedder, retry }
    }

    /// Embed text, retrying provider rate limits within the policy budget
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        retry_on_rate_limit(&self.retry, "embed_query", || self.embedder.embed(text)).await
    }

    /// Similarity of every embedded chunk to the query embedding
    pub fn similarities(&self, query_embedding: &[f32], chunks: &[Chunk]) -> HashMap<Uuid, f32> {
        chunks
            .iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_deref().filter(|e| !e.is_empty())?;
                Some((chunk.id, cosine_similarity(query_embedding, embedding)))
            })
            .collect()
    }

    /// Top `top_k` embedded chunks by similarity, descending
    pub fn search(
        &self,
        query_embedding: &[f32],
        chunks: &[Chunk],
        top_k: usize,
    ) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(&Chunk, f32)> = chunks
            .iter()
            .filter_map(|chunk| {
                let embedding = chunk.embedding.as_deref().filter(|e| !e.is_empty())?;
                Some((chunk, cosine_similarity(query_embedding, embedding)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(chunk, similarity)| {
                let score = similarity.max(0.0);
                RetrievedChunk::from_chunk(chunk, score, 0.0, score)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_common::db::models::{ChunkMetadata, DocumentType};
    use pitwall_common::embeddings::MockEmbedder;
    use std::time::Duration;

    fn chunk(content: &str, embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id: Uuid::nil(),
            content: content.to_string(),
            chunk_index: 0,
            embedding,
            metadata: ChunkMetadata {
                document_title: "Test".to_string(),
                document_type: DocumentType::Performance,
                source: None,
                start_position: 0,
                end_position: content.len(),
                keywords: vec![],
            },
        }
    }

    fn scorer() -> VectorScorer {
        VectorScorer::new(Arc::new(MockEmbedder::new(8)), RetryPolicy::new(3, Duration::ZERO))
    }

    #[test]
    fn test_cosine_bounds() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);

        let same = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((same - 1.0).abs() < 1e-6);

        let opposite = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((opposite + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = [0.3, -1.2, 4.5, 0.01];
        let b = [2.2, 0.7, -0.4, 9.0];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_search_only_embedded_sorted() {
        let corpus = vec![
            chunk("far", Some(vec![0.0, 1.0])),
            chunk("none", None),
            chunk("near", Some(vec![1.0, 0.1])),
            chunk("empty", Some(vec![])),
        ];

        let results = scorer().search(&[1.0, 0.0], &corpus, 10);
        let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "far"]);
        assert!(results[0].vector_score >= results[1].vector_score);

        assert_eq!(scorer().search(&[1.0, 0.0], &corpus, 1).len(), 1);
    }

    #[test]
    fn test_negative_similarity_floored() {
        let corpus = vec![chunk("opposite", Some(vec![-1.0, 0.0]))];
        let results = scorer().search(&[1.0, 0.0], &corpus, 5);
        assert_eq!(results[0].vector_score, 0.0);
    }

    #[tokio::test]
    async fn test_embed_retries_rate_limits() {
        let embedder = Arc::new(MockEmbedder::new(8).rate_limited_for(2));
        let scorer = VectorScorer::new(embedder.clone(), RetryPolicy::new(3, Duration::ZERO));

        let embedding = scorer.embed("pit stop").await.unwrap();
        assert_eq!(embedding.len(), 8);
        assert_eq!(embedder.calls(), 3);
    }
}
