//! Configuration management for Pitwall services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Text-generation provider configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Rate-limit retry policy for provider calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Chunking, scoring and fusion parameters
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer-generation parameters
    #[serde(default)]
    pub chat: ChatConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Concurrent chunk embeddings during ingestion
    #[serde(default = "default_embedding_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generation provider: openai, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key for the generation service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Chat model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,

    /// Output budget for answer synthesis
    #[serde(default = "default_answer_max_tokens")]
    pub answer_max_tokens: usize,

    /// Output budget for query expansion
    #[serde(default = "default_expansion_max_tokens")]
    pub expansion_max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts including the first call
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds
    #[serde(default = "default_retry_base_delay")]
    pub base_delay_ms: u64,

    /// Backoff growth factor
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Soft target for chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over from the previous chunk
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Results returned when the caller does not ask for a count
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Fusion weight of the vector signal when embeddings are available
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Fusion weight of the keyword signal when embeddings are available
    #[serde(default = "default_bm25_weight")]
    pub bm25_weight: f32,

    /// Boost added per metadata keyword found in the query
    #[serde(default = "default_keyword_boost")]
    pub keyword_boost: f32,

    /// Lower bound for the max used in score normalization
    #[serde(default = "default_normalization_floor")]
    pub normalization_floor: f32,

    /// Enable LLM query expansion
    #[serde(default = "default_enabled")]
    pub expansion_enabled: bool,

    /// Paraphrases requested in addition to the original query
    #[serde(default = "default_max_paraphrases")]
    pub max_paraphrases: usize,

    /// BM25 term-frequency saturation
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,

    /// BM25 length normalization
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatConfig {
    /// Prior turns forwarded to the generator
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Characters kept in a source citation excerpt
    #[serde(default = "default_excerpt_len")]
    pub excerpt_len: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_embedding_provider() -> String { "openai".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_concurrency() -> usize { 4 }
fn default_generation_provider() -> String { "openai".to_string() }
fn default_generation_model() -> String { "gpt-4o-mini".to_string() }
fn default_generation_timeout() -> u64 { 60 }
fn default_answer_max_tokens() -> usize { 1024 }
fn default_expansion_max_tokens() -> usize { 200 }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_base_delay() -> u64 { 1000 }
fn default_retry_multiplier() -> f64 { 2.0 }
fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 100 }
fn default_top_k() -> usize { 5 }
fn default_vector_weight() -> f32 { 0.6 }
fn default_bm25_weight() -> f32 { 0.4 }
fn default_keyword_boost() -> f32 { 0.1 }
fn default_normalization_floor() -> f32 { 0.001 }
fn default_max_paraphrases() -> usize { 2 }
fn default_bm25_k1() -> f64 { 1.2 }
fn default_bm25_b() -> f64 { 0.75 }
fn default_history_window() -> usize { 10 }
fn default_excerpt_len() -> usize { 200 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "pitwall".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            concurrency: default_embedding_concurrency(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            api_base: None,
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
            answer_max_tokens: default_answer_max_tokens(),
            expansion_max_tokens: default_expansion_max_tokens(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            base_delay_ms: default_retry_base_delay(),
            multiplier: default_retry_multiplier(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            vector_weight: default_vector_weight(),
            bm25_weight: default_bm25_weight(),
            keyword_boost: default_keyword_boost(),
            normalization_floor: default_normalization_floor(),
            expansion_enabled: default_enabled(),
            max_paraphrases: default_max_paraphrases(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            excerpt_len: default_excerpt_len(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__RETRIEVAL__TOP_K=8
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }


    /// Reject combinations the retrieval pipeline cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        let retrieval = &self.retrieval;

        if retrieval.chunk_size == 0 {
            return Err(ConfigError::Message("retrieval.chunk_size must be positive".into()));
        }
        if retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(ConfigError::Message(
                "retrieval.chunk_overlap must be smaller than retrieval.chunk_size".into(),
            ));
        }
        if retrieval.vector_weight < 0.0 || retrieval.bm25_weight < 0.0 {
            return Err(ConfigError::Message("fusion weights must be non-negative".into()));
        }
        if retrieval.normalization_floor <= 0.0 {
            return Err(ConfigError::Message(
                "retrieval.normalization_floor must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message("retry.max_attempts must be at least 1".into()));
        }
        if self.embedding.concurrency == 0 {
            return Err(ConfigError::Message("embedding.concurrency must be at least 1".into()));
        }

        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retry: RetryConfig::default(),
            retrieval: RetrievalConfig::default(),
            chat: ChatConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.retrieval.chunk_size, 500);
        assert_eq!(config.retrieval.chunk_overlap, 100);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_source_matches_default() {
        let config: AppConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.retrieval.top_k, AppConfig::default().retrieval.top_k);
        assert_eq!(config.chat.history_window, 10);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_attempts_required() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
