//! Pitwall Common Library
//!
//! Shared code for all Pitwall crates including:
//! - Document and chunk models with the repository abstraction
//! - Embedding and text-generation provider clients
//! - Error types and handling
//! - Configuration management
//! - Rate-limit retry policy
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod retry;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{MemoryRepository, Repository};
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use llm::{ChatMessage, ChatRole, TextGenerator};
pub use retry::RetryPolicy;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
