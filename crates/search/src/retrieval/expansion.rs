//! LLM query expansion
//!
//! Asks the text-generation provider for alternative phrasings returned as a
//! JSON array of strings. The original query always comes first.

use pitwall_common::config::{GenerationConfig, RetrievalConfig};
use pitwall_common::errors::Result;
use pitwall_common::llm::{ChatMessage, TextGenerator};
use pitwall_common::retry::{retry_on_rate_limit, RetryPolicy};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const EXPANSION_PROMPT: &str = "You rewrite search queries for a Formula 1 knowledge base. \
Given the user's query, return alternative phrasings that keep the same meaning, \
using Formula 1 terminology where it helps. \
Respond with only a JSON array of strings and nothing else.";

/// Generates paraphrases of a query
pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    max_paraphrases: usize,
    max_tokens: usize,
}

impl QueryExpander {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        retry: RetryPolicy,
        max_paraphrases: usize,
        max_tokens: usize,
    ) -> Self {
        Self {
            generator,
            retry,
            max_paraphrases,
            max_tokens,
        }
    }

    pub fn from_config(
        generator: Arc<dyn TextGenerator>,
        retry: RetryPolicy,
        retrieval: &RetrievalConfig,
        generation: &GenerationConfig,
    ) -> Self {
        Self::new(
            generator,
            retry,
            retrieval.max_paraphrases,
            generation.expansion_max_tokens,
        )
    }

    /// Original query followed by up to `max_paraphrases` alternatives.
    ///
    /// Malformed provider output yields just the original query; provider
    /// errors are returned to the caller.
    #[instrument(skip(self))]
    pub async fn expand(&self, query: &str) -> Result<Vec<String>> {
        let user = format!(
            "Query: {}\nReturn at most {} alternative phrasings.",
            query, self.max_paraphrases
        );
        let messages = [ChatMessage::user(user)];

        let reply = retry_on_rate_limit(&self.retry, "expand_query", || {
            self.generator
                .complete(EXPANSION_PROMPT, &messages, self.max_tokens)
        })
        .await?;

        Ok(self.parse_variants(query, &reply))
    }

    /// Parse the provider reply into query variants
    pub fn parse_variants(&self, query: &str, reply: &str) -> Vec<String> {
        let mut variants = vec![query.to_string()];

        let parsed = match extract_json_array(reply) {
            Some(parsed) => parsed,
            None => {
                warn!(reply_len = reply.len(), "Malformed expansion output, using original query");
                return variants;
            }
        };

        for candidate in parsed {
            if variants.len() > self.max_paraphrases {
                break;
            }
            let candidate = candidate.trim();
            if candidate.is_empty()
                || variants.iter().any(|v| v.eq_ignore_ascii_case(candidate))
            {
                continue;
            }
            variants.push(candidate.to_string());
        }

        debug!(variants = variants.len(), "Query expanded");
        variants
    }
}

/// The JSON string array between the first `[` and the last `]`
fn extract_json_array(reply: &str) -> Option<Vec<String>> {
    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}
