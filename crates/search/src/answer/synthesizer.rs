//! Answer synthesizer - grounds generated answers in retrieved passages
//!
//! Provides:
//! - Retrieval of the top-K passages for the question
//! - A system prompt embedding the numbered context block
//! - Bounded conversation history
//! - Citation extraction from the reply

use super::context::{build_context_block, extract_citations, SourceCitation};
use crate::retrieval::{RetrievalMode, Retriever};
use pitwall_common::config::AppConfig;
use pitwall_common::errors::Result;
use pitwall_common::llm::{ChatMessage, TextGenerator};
use pitwall_common::retry::{retry_on_rate_limit, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Generated answer with its sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated answer text
    pub content: String,

    /// Passages supplied to the model, in context order
    pub sources: Vec<SourceCitation>,

    /// 1-based source indices referenced in the answer
    pub cited: Vec<usize>,

    /// Retrieval mode used for the context
    pub mode: RetrievalMode,
}

/// Synthesis options
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    /// Passages retrieved per question
    pub top_k: usize,

    /// Most recent history turns kept
    pub history_window: usize,

    /// Excerpt length for citations
    pub excerpt_len: usize,

    /// Maximum output tokens
    pub max_tokens: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_window: 10,
            excerpt_len: 200,
            max_tokens: 1024,
        }
    }
}

impl SynthesisOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            history_window: config.chat.history_window,
            excerpt_len: config.chat.excerpt_len,
            max_tokens: config.generation.answer_max_tokens,
        }
    }
}

/// Synthesizer for generating answers
pub struct AnswerSynthesizer {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    options: SynthesisOptions,
}

impl AnswerSynthesizer {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn TextGenerator>,
        retry: RetryPolicy,
        options: SynthesisOptions,
    ) -> Self {
        Self {
            retriever,
            generator,
            retry,
            options,
        }
    }

    /// Answer `query` given prior conversation turns
    #[instrument(skip(self, history), fields(history_len = history.len()))]
    pub async fn answer(&self, query: &str, history: &[ChatMessage]) -> Result<Answer> {
        let report = self
            .retriever
            .retrieve_with_report(query, self.options.top_k)
            .await?;

        let system_prompt = build_system_prompt(&build_context_block(&report.chunks));

        let recent = history.len().saturating_sub(self.options.history_window);
        let mut messages: Vec<ChatMessage> = history[recent..].to_vec();
        messages.push(ChatMessage::user(query));

        let content = retry_on_rate_limit(&self.retry, "generate_answer", || {
            self.generator
                .complete(&system_prompt, &messages, self.options.max_tokens)
        })
        .await?;

        let cited = extract_citations(&content, report.chunks.len());
        let sources = report
            .chunks
            .iter()
            .map(|c| SourceCitation::from_retrieved(c, self.options.excerpt_len))
            .collect();

        info!(
            sources = report.chunks.len(),
            cited = cited.len(),
            mode = report.mode.as_str(),
            "Answer generated"
        );

        Ok(Answer {
            content,
            sources,
            cited,
            mode: report.mode,
        })
    }
}

fn build_system_prompt(context: &str) -> String {
    let context_section = if context.is_empty() {
        "No relevant context was found in the knowledge base. Say so, and answer only \
         from general Formula 1 knowledge while making clear it is not sourced."
            .to_string()
    } else {
        format!(
            "Cite sources inline as [1], [2], etc. using the numbers of the passages below.\n\n\
             Context:\n{}",
            context
        )
    };

    format!(
        "You are a Formula 1 expert assistant. Answer the user's question based on the \
         provided context. If the context doesn't contain enough information, say so. \
         Do not make up information.\n\n{}",
        context_section
    )
}
