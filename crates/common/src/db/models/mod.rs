//! Data model
//!
//! Entities owned by the storage layer: documents and the chunks cut from them.

mod chunk;
mod document;

pub use chunk::{Chunk, ChunkMetadata, NewChunk};
pub use document::{Document, DocumentType, NewDocument};
