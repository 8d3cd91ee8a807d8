//! Text chunking module
//!
//! Splits document text into overlapping, sentence-aligned passages.
//!
//! Sentences end at `.`, `!` or `?` followed by whitespace. Sentences are
//! accumulated greedily; once the next sentence would push the buffer past
//! `chunk_size` characters the buffer is emitted and the next one is seeded
//! with the trailing `chunk_overlap` characters of the emitted chunk.
//!
//! Every chunk is an exact slice of the source text: `start_pos`/`end_pos`
//! are byte offsets and `content == text[start_pos..end_pos]`.

use crate::keywords::extract_keywords;
use pitwall_common::config::RetrievalConfig;
use pitwall_common::db::models::{ChunkMetadata, Document, NewChunk};
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Target chunk size in characters (soft limit)
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl From<&RetrievalConfig> for ChunkingConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }
}

/// A text chunk with its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The chunk content
    pub content: String,
    /// Index of this chunk in the document
    pub index: usize,
    /// Start byte offset in original text
    pub start_pos: usize,
    /// End byte offset in original text (exclusive)
    pub end_pos: usize,
}

fn sentence_boundary() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"))
}

/// Byte spans of the trimmed, non-empty sentences in `text`
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<(usize, usize)>) {
        let slice = &text[start..end];
        let lead = slice.len() - slice.trim_start().len();
        let trail = slice.len() - slice.trim_end().len();
        if start + lead < end - trail {
            spans.push((start + lead, end - trail));
        }
    }

    let mut spans = Vec::new();
    let mut start = 0;

    for m in sentence_boundary().find_iter(text) {
        // Punctuation is ASCII, so the sentence ends one byte after the match start.
        push_trimmed(text, start, m.start() + 1, &mut spans);
        start = m.end();
    }
    push_trimmed(text, start, text.len(), &mut spans);

    spans
}

/// Byte offset where the trailing `overlap` characters of `text[start..end]` begin.
/// Always advances at least one character past `start`.
fn overlap_start(text: &str, start: usize, end: usize, overlap: usize) -> usize {
    let closed = &text[start..end];
    let closed_chars = closed.chars().count();
    let keep = overlap.min(closed_chars.saturating_sub(1));

    let offset = closed
        .char_indices()
        .nth(closed_chars - keep)
        .map(|(i, _)| i)
        .unwrap_or(closed.len());

    start + offset
}

/// Split text into overlapping chunks
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let spans = sentence_spans(text);
    let mut chunks = Vec::new();

    let emit = |start: usize, end: usize, chunks: &mut Vec<TextChunk>| {
        let index = chunks.len();
        chunks.push(TextChunk {
            content: text[start..end].to_string(),
            index,
            start_pos: start,
            end_pos: end,
        });
    };

    let mut buffer: Option<(usize, usize)> = None;

    for (sentence_start, sentence_end) in spans {
        buffer = Some(match buffer {
            None => (sentence_start, sentence_end),
            Some((buf_start, buf_end)) => {
                let prospective = text[buf_start..sentence_end].chars().count();
                if prospective > config.chunk_size {
                    emit(buf_start, buf_end, &mut chunks);

                    let seed = overlap_start(text, buf_start, buf_end, config.chunk_overlap);
                    let seeded = &text[seed..sentence_end];
                    let seed = seed + (seeded.len() - seeded.trim_start().len());
                    (seed, sentence_end)
                } else {
                    (buf_start, sentence_end)
                }
            }
        });
    }

    if let Some((buf_start, buf_end)) = buffer {
        if !text[buf_start..buf_end].trim().is_empty() {
            emit(buf_start, buf_end, &mut chunks);
        }
    }

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        chunk_size = config.chunk_size,
        "Text chunked"
    );

    chunks
}

/// Chunk a stored document into chunk records ready to persist
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<NewChunk> {
    chunk_text(&document.content, config)
        .into_iter()
        .map(|chunk| NewChunk {
            document_id: document.id,
            metadata: ChunkMetadata {
                document_title: document.title.clone(),
                document_type: document.doc_type,
                source: document.source.clone(),
                start_position: chunk.start_pos,
                end_position: chunk.end_pos,
                keywords: extract_keywords(&chunk.content),
            },
            chunk_index: chunk.index,
            content: chunk.content,
        })
        .collect()
}
