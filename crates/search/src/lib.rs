//! Pitwall Search
//!
//! Hybrid retrieval over the chunk corpus and grounded answer generation:
//! - BM25 keyword scoring and embedding similarity
//! - Query expansion, weighted fusion and keyword reranking
//! - Answer synthesis with numbered source citations

pub mod answer;
pub mod retrieval;

pub use answer::{Answer, AnswerSynthesizer, SourceCitation, SynthesisOptions};
pub use retrieval::{
    HybridRetriever, RetrievalMode, RetrievalReport, RetrievedChunk, Retriever, StageStatus,
};
