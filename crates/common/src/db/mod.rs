//! Storage layer for Pitwall
//!
//! Provides:
//! - Document and chunk models
//! - Repository trait consumed by ingestion and retrieval
//! - In-memory repository implementation

pub mod models;
mod memory;
mod repository;

pub use memory::MemoryRepository;
pub use repository::Repository;
