//! Text-generation provider abstraction
//!
//! Provides:
//! - `TextGenerator` trait used for query expansion and answer synthesis
//! - OpenAI-compatible chat-completions client
//! - Scripted mock generator for tests and offline runs

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a conversation under a system prompt
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI chat-completions client
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    max_tokens: usize,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAIGenerator {
    /// Create a new generator from configuration
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
        })
    }

    async fn call(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String> {
        let system = ChatMessage {
            role: ChatRole::System,
            content: system_prompt.to_string(),
        };

        let request = ChatRequest {
            model: &self.model,
            messages: std::iter::once(&system).chain(messages.iter()).collect(),
            max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::GenerationError {
                message: format!("LLM API request failed: {}", e),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderRateLimited {
                provider: "openai".to_string(),
                message: body,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationError {
                message: format!("LLM API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse =
            response.json().await.map_err(|e| AppError::GenerationError {
                message: format!("Failed to parse LLM response: {}", e),
            })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::GenerationError {
                message: "Empty response from LLM".to_string(),
            })
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String> {
        let start = Instant::now();
        let result = self.call(system_prompt, messages, max_tokens).await;
        metrics::record_generation(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A call observed by [`MockGenerator`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
}

/// Scripted reply for [`MockGenerator`]
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    RateLimited,
    Fail(String),
}

/// Generator that replays scripted replies and records every call.
///
/// Once the script is exhausted the fallback reply is returned.
pub struct MockGenerator {
    script: Mutex<VecDeque<MockReply>>,
    fallback: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGenerator {
    /// Mock that always answers with `fallback`
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply ahead of the fallback
    pub fn with_reply(self, reply: MockReply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(reply);
        }
        self
    }

    /// Queue a text reply ahead of the fallback
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_reply(MockReply::Text(text.into()))
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new("Based on the provided context, no further detail is available. [Mock response]")
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        max_tokens: usize,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                system_prompt: system_prompt.to_string(),
                messages: messages.to_vec(),
                max_tokens,
            });
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::RateLimited) => Err(AppError::ProviderRateLimited {
                provider: "mock".to_string(),
                message: "rate limited".to_string(),
            }),
            Some(MockReply::Fail(message)) => Err(AppError::GenerationError { message }),
            None => Ok(self.fallback.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock-generator"
    }
}

/// Create a text generator based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| AppError::Configuration {
                    message: "generation.api_key is required for the openai provider".to_string(),
                })?;
            Ok(Arc::new(OpenAIGenerator::new(key, config)?))
        }
        "mock" => Ok(Arc::new(MockGenerator::default())),
        other => {
            tracing::warn!(provider = other, "Unknown generation provider, using mock");
            Ok(Arc::new(MockGenerator::default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_replays_script_then_fallback() {
        let generator = MockGenerator::new("fallback")
            .with_text("first")
            .with_reply(MockReply::RateLimited)
            .with_reply(MockReply::Fail("down".to_string()));

        assert_eq!(generator.complete("sys", &[], 10).await.unwrap(), "first");
        assert!(generator.complete("sys", &[], 10).await.unwrap_err().is_rate_limited());
        assert!(matches!(
            generator.complete("sys", &[], 10).await,
            Err(AppError::GenerationError { .. })
        ));
        assert_eq!(generator.complete("sys", &[], 10).await.unwrap(), "fallback");
    }

    #[tokio::test]
    async fn test_mock_records_calls() {
        let generator = MockGenerator::new("ok");
        let history = vec![
            ChatMessage::user("Who won Monaco?"),
            ChatMessage::assistant("Leclerc."),
        ];

        generator.complete("Answer briefly", &history, 256).await.unwrap();

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system_prompt, "Answer briefly");
        assert_eq!(calls[0].messages, history);
        assert_eq!(calls[0].max_tokens, 256);
    }

    #[test]
    fn test_chat_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_create_generator_requires_key() {
        let config = GenerationConfig {
            provider: "openai".to_string(),
            api_key: None,
            ..GenerationConfig::default()
        };
        assert!(create_generator(&config).is_err());

        let mock = GenerationConfig {
            provider: "mock".to_string(),
            ..GenerationConfig::default()
        };
        assert_eq!(create_generator(&mock).unwrap().model_name(), "mock-generator");
    }
}
