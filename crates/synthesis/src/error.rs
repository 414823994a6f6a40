//! Synthesis error taxonomy.
//!
//! Only [`SynthesisError::Contract`] is ever returned from
//! [`SynthesisOrchestrator::synthesize`](crate::SynthesisOrchestrator::synthesize).
//! The other variants describe degraded outcomes: they become
//! [`SourceResult::Failed`](crate::SourceResult::Failed) reasons and log fields.

use std::time::Duration;

use thiserror::Error;
use vitalchat_core::error::{ProviderError, SearchError, StoreError};

#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    #[error("Classification failed: {0}")]
    Classification(#[source] ProviderError),

    #[error("Retrieval from {source_name} failed: {reason}")]
    Retrieval { source_name: String, reason: String },

    #[error("Summary of chunk {index} ({category}) failed: {reason}")]
    ChunkSummary {
        index: usize,
        category: String,
        reason: String,
    },

    #[error("Summarization exceeded its {0:?} deadline")]
    SummaryTimeout(Duration),

    #[error("Invalid request: {0}")]
    Contract(String),
}

impl SynthesisError {
    pub fn retrieval(source_name: &str, reason: impl std::fmt::Display) -> Self {
        Self::Retrieval {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<SearchError> for SynthesisError {
    fn from(e: SearchError) -> Self {
        Self::retrieval("web", e)
    }
}

impl From<StoreError> for SynthesisError {
    fn from(e: StoreError) -> Self {
        Self::retrieval("health", e)
    }
}

impl From<SynthesisError> for vitalchat_core::Error {
    fn from(e: SynthesisError) -> Self {
        vitalchat_core::Error::Internal(e.to_string())
    }
}
