//! BM25 keyword scoring over chunk text
//!
//! Linear scan over the corpus. Document frequency and term frequency both
//! work on Unicode-lowercased text: a term counts every non-overlapping
//! literal occurrence, so it also matches inside longer words.
//! Lengths are measured in characters.

use pitwall_common::config::RetrievalConfig;
use pitwall_common::db::models::Chunk;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Query tokens of this many characters or fewer are ignored
const MIN_TERM_CHARS: usize = 2;

/// BM25 scorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Scorer {
    k1: f64,
    b: f64,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Scorer {
    pub fn new(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.bm25_k1, config.bm25_b)
    }

    /// Lowercased whitespace tokens longer than two characters
    pub fn query_terms(query: &str) -> Vec<String> {
        query
            .split_whitespace()
            .filter(|t| t.chars().count() > MIN_TERM_CHARS)
            .map(str::to_lowercase)
            .collect()
    }

    /// Score every chunk against `query`.
    ///
    /// Only chunks with a positive score appear in the result.
    pub fn score(&self, query: &str, chunks: &[Chunk]) -> HashMap<Uuid, f32> {
        let terms = Self::query_terms(query);
        if terms.is_empty() || chunks.is_empty() {
            return HashMap::new();
        }

        let n = chunks.len() as f64;
        let lowered: Vec<String> = chunks.iter().map(|c| c.content.to_lowercase()).collect();
        let lengths: Vec<f64> = chunks
            .iter()
            .map(|c| c.content.chars().count() as f64)
            .collect();
        let avg_dl = lengths.iter().sum::<f64>() / n;
        if avg_dl <= 0.0 {
            return HashMap::new();
        }

        let mut totals = vec![0.0f64; chunks.len()];

        for term in &terms {
            let df = lowered.iter().filter(|c| c.contains(term.as_str())).count() as f64;
            if df == 0.0 {
                continue;
            }
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (i, content) in lowered.iter().enumerate() {
                let tf = content.matches(term.as_str()).count() as f64;
                if tf == 0.0 {
                    continue;
                }
                let norm = self.k1 * (1.0 - self.b + self.b * lengths[i] / avg_dl);
                totals[i] += idf * tf * (self.k1 + 1.0) / (tf + norm);
            }
        }

        let scores: HashMap<Uuid, f32> = chunks
            .iter()
            .zip(totals)
            .filter(|(_, total)| *total > 0.0)
            .map(|(chunk, total)| (chunk.id, total as f32))
            .collect();

        debug!(
            terms = terms.len(),
            corpus = chunks.len(),
            matched = scores.len(),
            "BM25 scored"
        );

        scores
    }
}
