//! Hybrid retrieval combining vector and BM25 search
//!
//! Sequence per query:
//! 1. Load the corpus; an empty corpus returns no results
//! 2. Expand the query (best effort)
//! 3. If any chunk is embedded, embed every variant concurrently and keep
//!    the maximum similarity per chunk (best effort)
//! 4. Score BM25 against the original query only
//! 5. Fuse and rerank

use super::{
    bm25::Bm25Scorer, expansion::QueryExpander, fusion::WeightedFusion, vector::VectorScorer,
    RetrievalMode, RetrievalReport, Retriever, StageStatus,
};
use futures::future::try_join_all;
use pitwall_common::config::AppConfig;
use pitwall_common::db::models::Chunk;
use pitwall_common::db::Repository;
use pitwall_common::embeddings::Embedder;
use pitwall_common::errors::Result;
use pitwall_common::llm::TextGenerator;
use pitwall_common::metrics;
use pitwall_common::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Hybrid retriever combining vector and BM25
pub struct HybridRetriever {
    repository: Arc<dyn Repository>,
    vector: VectorScorer,
    bm25: Bm25Scorer,
    fusion: WeightedFusion,
    expander: Option<QueryExpander>,
}

impl HybridRetriever {
    /// Create a new hybrid retriever without query expansion
    pub fn new(repository: Arc<dyn Repository>, vector: VectorScorer) -> Self {
        Self {
            repository,
            vector,
            bm25: Bm25Scorer::default(),
            fusion: WeightedFusion::default(),
            expander: None,
        }
    }

    /// Build a retriever from application configuration
    pub fn from_config(
        repository: Arc<dyn Repository>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        config: &AppConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        let retriever = Self::new(repository, VectorScorer::new(embedder, retry.clone()))
            .with_bm25(Bm25Scorer::from_config(&config.retrieval))
            .with_fusion(WeightedFusion::from_config(&config.retrieval));

        if config.retrieval.expansion_enabled {
            retriever.with_expander(QueryExpander::from_config(
                generator,
                retry,
                &config.retrieval,
                &config.generation,
            ))
        } else {
            retriever
        }
    }

    pub fn with_bm25(mut self, bm25: Bm25Scorer) -> Self {
        self.bm25 = bm25;
        self
    }

    pub fn with_fusion(mut self, fusion: WeightedFusion) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn with_expander(mut self, expander: QueryExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    async fn expand(&self, query: &str) -> (Vec<String>, StageStatus) {
        let Some(expander) = &self.expander else {
            return (vec![query.to_string()], StageStatus::skipped("query expansion disabled"));
        };

        match expander.expand(query).await {
            Ok(variants) if variants.len() > 1 => (variants, StageStatus::Succeeded),
            Ok(variants) => {
                metrics::record_degradation("query_expansion");
                (variants, StageStatus::degraded("no usable paraphrases"))
            }
            Err(e) => {
                warn!(error = %e, "Query expansion failed, using original query");
                metrics::record_degradation("query_expansion");
                (vec![query.to_string()], StageStatus::degraded(e.to_string()))
            }
        }
    }

    /// Max similarity per embedded chunk across all query variants
    async fn vector_scores(
        &self,
        variants: &[String],
        chunks: &[Chunk],
    ) -> Result<HashMap<Uuid, f32>> {
        let embeddings = try_join_all(variants.iter().map(|v| self.vector.embed(v))).await?;

        let mut merged: HashMap<Uuid, f32> = HashMap::new();
        for embedding in &embeddings {
            for (id, similarity) in self.vector.similarities(embedding, chunks) {
                merged
                    .entry(id)
                    .and_modify(|best| *best = best.max(similarity))
                    .or_insert(similarity);
            }
        }

        Ok(merged)
    }
}

#[async_trait::async_trait]
impl Retriever for HybridRetriever {
    #[instrument(skip(self), fields(query_len = query.len()))]
    async fn retrieve_with_report(&self, query: &str, top_k: usize) -> Result<RetrievalReport> {
        let start = Instant::now();
        let chunks = self.repository.list_chunks().await?;

        if chunks.is_empty() {
            debug!("Empty corpus, nothing to retrieve");
            metrics::record_retrieval(
                start.elapsed().as_secs_f64(),
                RetrievalMode::EmptyCorpus.as_str(),
                0,
            );
            return Ok(RetrievalReport {
                chunks: vec![],
                mode: RetrievalMode::EmptyCorpus,
                query_variants: vec![query.to_string()],
                expansion: StageStatus::skipped("empty corpus"),
                vector: StageStatus::skipped("empty corpus"),
            });
        }

        let (variants, expansion) = self.expand(query).await;

        let (vector_scores, vector_status) = if !chunks.iter().any(Chunk::has_embedding) {
            (HashMap::new(), StageStatus::skipped("no chunk embeddings"))
        } else {
            match self.vector_scores(&variants, &chunks).await {
                Ok(scores) => (scores, StageStatus::Succeeded),
                Err(e) => {
                    warn!(error = %e, "Vector search failed, falling back to keyword scoring");
                    metrics::record_degradation("vector_search");
                    (HashMap::new(), StageStatus::degraded(e.to_string()))
                }
            }
        };

        let bm25_scores = self.bm25.score(query, &chunks);
        let results = self
            .fusion
            .fuse(&vector_scores, &bm25_scores, &chunks, query, top_k);

        let mode = if vector_scores.is_empty() {
            RetrievalMode::KeywordOnly
        } else {
            RetrievalMode::Hybrid
        };

        metrics::record_retrieval(start.elapsed().as_secs_f64(), mode.as_str(), results.len());
        info!(
            corpus = chunks.len(),
            variants = variants.len(),
            vector_matches = vector_scores.len(),
            bm25_matches = bm25_scores.len(),
            results = results.len(),
            mode = mode.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Retrieval complete"
        );

        Ok(RetrievalReport {
            chunks: results,
            mode,
            query_variants: variants,
            expansion,
            vector: vector_status,
        })
    }
}
