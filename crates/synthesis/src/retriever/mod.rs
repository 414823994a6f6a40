//! Source retrievers.
//!
//! Each retriever decides for itself whether its source is needed, fetches
//! once, and reports a [`SourceResult`]. Errors never escape a retriever:
//! they become [`SourceResult::Failed`] so the sibling source is unaffected.

pub mod health;
pub mod web;

pub use health::{HealthFetch, HealthRetriever};
pub use web::{WebPayload, WebRetriever};

use crate::error::SynthesisError;

/// Outcome of one retriever for one query.
#[derive(Debug, Clone)]
pub enum SourceResult<P> {
    Unneeded,
    Fetched(P),
    Failed(SynthesisError),
}

impl<P> SourceResult<P> {
    pub fn is_fetched(&self) -> bool {
        matches!(self, SourceResult::Fetched(_))
    }

    pub fn fetched(self) -> Option<P> {
        match self {
            SourceResult::Fetched(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn status(&self) -> SourceStatus {
        match self {
            SourceResult::Unneeded => SourceStatus::Unneeded,
            SourceResult::Fetched(_) => SourceStatus::Fetched,
            SourceResult::Failed(e) => SourceStatus::Failed(e.to_string()),
        }
    }
}

/// Payload-free view of a [`SourceResult`], kept on the synthesis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Unneeded,
    Fetched,
    Failed(String),
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Unneeded => f.write_str("unneeded"),
            SourceStatus::Fetched => f.write_str("fetched"),
            SourceStatus::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}
