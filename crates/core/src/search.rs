//! Web search capability.
//!
//! A search returns one textual answer plus the source URLs it was built
//! from. Implementations: OpenAI search-preview models; mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::SearchError;

/// The result of a single web search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The search engine's textual answer.
    pub answer: String,

    /// Source URLs, in the order the engine reported them.
    #[serde(default)]
    pub sources: Vec<String>,
}

#[async_trait]
pub trait SearchCapability: Send + Sync {
    /// Name of the backend (for logs).
    fn name(&self) -> &str;

    /// Run one search for `query`.
    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError>;
}
