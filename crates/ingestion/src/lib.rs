//! Pitwall Ingestion
//!
//! Turns documents into retrievable chunks:
//! 1. Validates and stores the document
//! 2. Splits its text into overlapping sentence-aligned chunks
//! 3. Tags each chunk with racing keywords
//! 4. Embeds chunks concurrently and writes the vectors back

pub mod chunker;
pub mod keywords;
pub mod processor;

pub use chunker::{chunk_document, chunk_text, ChunkingConfig, TextChunk};
pub use keywords::extract_keywords;
pub use processor::{EmbeddingSummary, IngestionProcessor, IngestionReport};
