//! Web source: relevance check, one search, answer plus cited sources.

use std::sync::Arc;

use tracing::{debug, warn};
use vitalchat_core::search::{SearchCapability, SearchResponse};
use vitalchat_core::status::{ProgressStage, StatusRegister};

use super::SourceResult;
use crate::classifier::{Relevance, RelevanceClassifier};
use crate::error::SynthesisError;

/// Sources listed under the answer.
const LISTED_SOURCES: usize = 3;

/// Formatted search results.
#[derive(Debug, Clone, PartialEq)]
pub struct WebPayload {
    pub text: String,
    /// Every deduplicated source URL, in reported order.
    pub sources: Vec<String>,
}

#[derive(Clone)]
pub struct WebRetriever {
    classifier: Arc<RelevanceClassifier>,
    search: Option<Arc<dyn SearchCapability>>,
}

impl WebRetriever {
    pub fn new(classifier: Arc<RelevanceClassifier>) -> Self {
        Self {
            classifier,
            search: None,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchCapability>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    pub async fn retrieve(&self, query: &str, status: &StatusRegister) -> SourceResult<WebPayload> {
        let Some(search) = &self.search else {
            return SourceResult::Unneeded;
        };
        if !self.classifier.classify(query, Relevance::Search).await {
            debug!("Web search not needed");
            return SourceResult::Unneeded;
        }

        status.set(ProgressStage::SearchingWeb);
        let response = match search.search(query).await {
            Ok(response) => response,
            Err(e) => {
                let err = SynthesisError::from(e);
                warn!(search = search.name(), error = %err, "Web retrieval failed");
                return SourceResult::Failed(err);
            }
        };

        status.set(ProgressStage::AnalyzingWebData);
        let payload = format_response(response);
        debug!(sources = payload.sources.len(), "Web results formatted");
        SourceResult::Fetched(payload)
    }
}

fn format_response(response: SearchResponse) -> WebPayload {
    let mut sources: Vec<String> = Vec::with_capacity(response.sources.len());
    for url in response.sources {
        if !sources.contains(&url) {
            sources.push(url);
        }
    }

    let mut text = response.answer.trim().to_string();
    if !sources.is_empty() {
        text.push_str("\n\nSources:");
        for (i, url) in sources.iter().take(LISTED_SOURCES).enumerate() {
            text.push_str(&format!("\n{}. [{}]({url})", i + 1, domain(url)));
        }
    }

    WebPayload { text, sources }
}

/// Host of `url` without a leading `www.`.
fn domain(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    host.strip_prefix("www.").unwrap_or(host)
}
