//! VitalChat Synthesis - turns a question into generation-ready messages.
//!
//! For each query the [`SynthesisOrchestrator`] runs two retrievers
//! concurrently: [`WebRetriever`] (relevance check, then one web search) and
//! [`HealthRetriever`] (relevance check or metric keywords, then EHR records
//! and windowed mobile metrics). An oversized health payload is reduced by the
//! [`ChunkSummarizer`] under a deadline. Progress is published through a
//! shared [`StatusRegister`](vitalchat_core::StatusRegister).
//!
//! Every degraded path still produces a result; only a malformed request is
//! an error.

pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod prompts;
pub mod retriever;
pub mod summarizer;
pub mod token;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use classifier::{Relevance, RelevanceClassifier};
pub use error::SynthesisError;
pub use orchestrator::{SourceKind, SynthesisOrchestrator, SynthesisResult};
pub use retriever::{
    HealthFetch, HealthRetriever, SourceResult, SourceStatus, WebPayload, WebRetriever,
};
pub use summarizer::{ChunkSummarizer, Summary, SummaryKind};
pub use token::{Chunk, HeuristicCounter, TokenCounter, counter_from_config};

#[cfg(feature = "tokenizer")]
pub use token::HfTokenizerCounter;
