//! Context block and source citations for answer generation

use crate::retrieval::RetrievedChunk;
use pitwall_common::db::models::DocumentType;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

/// Default excerpt length in characters
pub const DEFAULT_EXCERPT_LEN: usize = 200;

/// Source shown next to an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub document_id: Uuid,
    pub chunk_id: Uuid,
    pub title: String,
    /// First `excerpt_len` characters, with `...` appended when truncated
    pub excerpt: String,
    pub relevance_score: f32,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
}

impl SourceCitation {
    pub fn from_retrieved(chunk: &RetrievedChunk, excerpt_len: usize) -> Self {
        Self {
            document_id: chunk.document_id,
            chunk_id: chunk.id,
            title: chunk.metadata.document_title.clone(),
            excerpt: excerpt(&chunk.content, excerpt_len),
            relevance_score: chunk.combined_score,
            doc_type: chunk.metadata.document_type,
        }
    }
}

fn excerpt(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Numbered context passages: `[1] <title>\n<content>`, separated by blank lines
pub fn build_context_block(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!("[{}] {}\n{}", i + 1, chunk.metadata.document_title, chunk.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Distinct, sorted 1-based citation markers in `text` that refer to one
/// of `source_count` passages
pub fn extract_citations(text: &str, source_count: usize) -> Vec<usize> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"));

    let mut cited: Vec<usize> = pattern
        .captures_iter(text)
        .filter_map(|cap| cap.get(1)?.as_str().parse::<usize>().ok())
        .filter(|idx| *idx > 0 && *idx <= source_count)
        .collect();

    cited.sort_unstable();
    cited.dedup();
    cited
}
