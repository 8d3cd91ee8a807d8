//! Weighted score fusion and keyword reranking
//!
//! Two stages:
//! - Linear fusion of max-normalized vector and BM25 scores. Without any
//!   vector scores the keyword weight becomes 1.0.
//! - A multiplicative boost of `keyword_boost` per metadata keyword found in
//!   the query, followed by a cap at 1.0.
//!
//! Ties keep corpus order (stable sort).

use super::RetrievedChunk;
use pitwall_common::config::RetrievalConfig;
use pitwall_common::db::models::Chunk;
use std::collections::HashMap;
use uuid::Uuid;

/// Fusion parameters
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedFusion {
    /// Weight for vector scores when any exist
    pub vector_weight: f32,

    /// Weight for BM25 scores when vector scores exist
    pub bm25_weight: f32,

    /// Boost added per matching metadata keyword
    pub keyword_boost: f32,

    /// Lower bound on the normalization divisor
    pub normalization_floor: f32,
}

impl Default for WeightedFusion {
    fn default() -> Self {
        Self {
            vector_weight: 0.6,
            bm25_weight: 0.4,
            keyword_boost: 0.1,
            normalization_floor: 0.001,
        }
    }
}

impl WeightedFusion {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            vector_weight: config.vector_weight,
            bm25_weight: config.bm25_weight,
            keyword_boost: config.keyword_boost,
            normalization_floor: config.normalization_floor,
        }
    }

    /// Divide each score by the map's maximum (at least the floor).
    /// Negative scores are clamped to 0 first.
    fn normalize(&self, scores: &HashMap<Uuid, f32>) -> HashMap<Uuid, f32> {
        let max = scores
            .values()
            .fold(0.0f32, |acc, s| acc.max(*s))
            .max(self.normalization_floor);

        scores
            .iter()
            .map(|(id, score)| (*id, score.max(0.0) / max))
            .collect()
    }

    /// Multiplicative boost for metadata keywords contained in the query
    pub fn keyword_multiplier(&self, keywords: &[String], query_lower: &str) -> f32 {
        let matches = keywords
            .iter()
            .filter(|k| !k.is_empty() && query_lower.contains(k.to_lowercase().as_str()))
            .count();
        1.0 + self.keyword_boost * matches as f32
    }

    /// Fuse score maps over `chunks` and return at most `top_k` results
    pub fn fuse(
        &self,
        vector_scores: &HashMap<Uuid, f32>,
        bm25_scores: &HashMap<Uuid, f32>,
        chunks: &[Chunk],
        query: &str,
        top_k: usize,
    ) -> Vec<RetrievedChunk> {
        let (vector_weight, bm25_weight) = if vector_scores.is_empty() {
            (0.0, 1.0)
        } else {
            (self.vector_weight, self.bm25_weight)
        };

        let vector = self.normalize(vector_scores);
        let bm25 = self.normalize(bm25_scores);
        let query_lower = query.to_lowercase();

        let mut results: Vec<RetrievedChunk> = chunks
            .iter()
            .filter_map(|chunk| {
                let vector_score = vector.get(&chunk.id).copied().unwrap_or(0.0);
                let bm25_score = bm25.get(&chunk.id).copied().unwrap_or(0.0);
                let combined = vector_weight * vector_score + bm25_weight * bm25_score;
                if combined <= 0.0 {
                    return None;
                }

                let boost = self.keyword_multiplier(&chunk.metadata.keywords, &query_lower);
                let final_score = (combined * boost).min(1.0);

                Some(RetrievedChunk::from_chunk(
                    chunk,
                    vector_score,
                    bm25_score,
                    final_score,
                ))
            })
            .collect();

        results.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitwall_common::db::models::{ChunkMetadata, DocumentType};

    fn make_chunk(id: u128, keywords: &[&str]) -> Chunk {
        Chunk {
            id: Uuid::from_u128(id),
            document_id: Uuid::from_u128(1),
            content: format!("Chunk {}", id),
            chunk_index: id as usize,
            embedding: None,
            metadata: ChunkMetadata {
                document_title: "Race notes".to_string(),
                document_type: DocumentType::Analysis,
                source: None,
                start_position: 0,
                end_position: 8,
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            },
        }
    }

    fn scores(pairs: &[(u128, f32)]) -> HashMap<Uuid, f32> {
        pairs.iter().map(|(id, s)| (Uuid::from_u128(*id), *s)).collect()
    }

    #[test]
    fn test_weighted_fusion() {
        let fusion = WeightedFusion::default();
        let chunks = vec![make_chunk(1, &[]), make_chunk(2, &[]), make_chunk(3, &[])];

        // Vector: A (0.9), B (0.45); BM25: B (4.0), C (2.0)
        let vector = scores(&[(1, 0.9), (2, 0.45)]);
        let bm25 = scores(&[(2, 4.0), (3, 2.0)]);

        let results = fusion.fuse(&vector, &bm25, &chunks, "query", 10);

        // B = 0.6*0.5 + 0.4*1.0 = 0.7, A = 0.6, C = 0.2
        let ids: Vec<Uuid> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(2), Uuid::from_u128(1), Uuid::from_u128(3)]);
        assert!((results[0].combined_score - 0.7).abs() < 1e-6);
        assert!((results[0].vector_score - 0.5).abs() < 1e-6);
        assert!((results[0].bm25_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_keyword_only_fallback() {
        let fusion = WeightedFusion::default();
        let chunks = vec![make_chunk(1, &[]), make_chunk(2, &[])];
        let bm25 = scores(&[(1, 1.0), (2, 3.0)]);

        let results = fusion.fuse(&HashMap::new(), &bm25, &chunks, "query", 10);

        assert_eq!(results[0].id, Uuid::from_u128(2));
        assert_eq!(results[0].combined_score, 1.0);
        assert!(results.iter().all(|r| r.vector_score == 0.0));
    }

    #[test]
    fn test_zero_combined_excluded() {
        let fusion = WeightedFusion::default();
        let chunks = vec![make_chunk(1, &[]), make_chunk(2, &[])];
        let bm25 = scores(&[(1, 2.0)]);

        let results = fusion.fuse(&HashMap::new(), &bm25, &chunks, "query", 10);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_boost_accumulates_then_caps() {
        let fusion = WeightedFusion::default();
        let keywords = ["undercut", "tire", "strategy", "monaco", "pit stop"];
        let chunks = vec![make_chunk(1, &keywords), make_chunk(2, &[])];
        let bm25 = scores(&[(1, 1.0), (2, 2.0)]);

        assert!(
            (fusion.keyword_multiplier(
                &keywords.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
                "undercut tire strategy at monaco after the pit stop"
            ) - 1.5)
                .abs()
                < 1e-6
        );

        let results = fusion.fuse(
            &HashMap::new(),
            &bm25,
            &chunks,
            "Undercut tire STRATEGY at Monaco after the pit stop",
            10,
        );

        // 0.5 * 1.5 = 0.75 for chunk 1; chunk 2 is already 1.0
        assert_eq!(results[0].id, Uuid::from_u128(2));
        assert!((results[1].combined_score - 0.75).abs() < 1e-6);

        let strong = fusion.fuse(
            &HashMap::new(),
            &scores(&[(1, 5.0)]),
            &chunks,
            "undercut tire",
            10,
        );
        assert_eq!(strong[0].combined_score, 1.0);
    }

    #[test]
    fn test_ties_keep_corpus_order_and_top_k() {
        let fusion = WeightedFusion::default();
        let chunks: Vec<Chunk> = (1..=6).map(|i| make_chunk(i, &[])).collect();
        let bm25 = scores(&[(1, 1.0), (2, 1.0), (3, 1.0), (4, 1.0), (5, 1.0), (6, 1.0)]);

        let results = fusion.fuse(&HashMap::new(), &bm25, &chunks, "query", 4);

        let ids: Vec<u128> = results.iter().map(|r| r.id.as_u128()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_negative_vector_scores_clamped() {
        let fusion = WeightedFusion::default();
        let chunks = vec![make_chunk(1, &[])];
        let vector = scores(&[(1, -0.5)]);

        let results = fusion.fuse(&vector, &HashMap::new(), &chunks, "query", 5);
        assert!(results.is_empty());
    }

    #[test]
    fn test_empty_score_maps() {
        let fusion = WeightedFusion::default();
        let chunks = vec![make_chunk(1, &[])];
        assert!(fusion
            .fuse(&HashMap::new(), &HashMap::new(), &chunks, "query", 5)
            .is_empty());
    }
}
