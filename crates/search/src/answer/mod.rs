//! Answer generation on top of retrieval
//!
//! Provides:
//! - Numbered context blocks for the generation prompt
//! - Source citations with excerpts
//! - The answer synthesizer

mod context;
mod synthesizer;

pub use context::{build_context_block, extract_citations, SourceCitation, DEFAULT_EXCERPT_LEN};
pub use synthesizer::{Answer, AnswerSynthesizer, SynthesisOptions};
