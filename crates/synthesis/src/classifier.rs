//! Relevance classification.
//!
//! Each decision is one short generation call answered with `YES` or `NO`.
//! When the call fails the classifier falls back per kind: search is
//! assumed relevant, personal health data is assumed not relevant. An
//! unneeded search costs little; exposing health data unnecessarily does not.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use vitalchat_config::ClassifierConfig;
use vitalchat_core::health::CategoryMap;
use vitalchat_core::message::Message;
use vitalchat_core::provider::{Provider, ProviderRequest};

use crate::error::SynthesisError;
use crate::prompts;

/// What a query might need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Search,
    Health,
}

impl Relevance {
    /// Decision used when the classification call fails.
    pub fn fallback(&self) -> bool {
        match self {
            Relevance::Search => true,
            Relevance::Health => false,
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            Relevance::Search => prompts::SEARCH_CLASSIFIER,
            Relevance::Health => prompts::HEALTH_CLASSIFIER,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relevance::Search => "search",
            Relevance::Health => "health",
        }
    }
}

pub struct RelevanceClassifier {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    category_max_tokens: u32,
}

impl RelevanceClassifier {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        let defaults = ClassifierConfig::default();
        Self {
            provider,
            model: model.into(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            category_max_tokens: defaults.category_max_tokens,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &ClassifierConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            category_max_tokens: config.category_max_tokens,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Decide, falling back per [`Relevance::fallback`] on error.
    pub async fn classify(&self, query: &str, kind: Relevance) -> bool {
        match self.try_classify(query, kind).await {
            Ok(decision) => decision,
            Err(e) => {
                let decision = kind.fallback();
                warn!(kind = kind.as_str(), decision, error = %e, "Classifier failed, using fallback");
                decision
            }
        }
    }

    pub async fn try_classify(&self, query: &str, kind: Relevance) -> Result<bool, SynthesisError> {
        let request = ProviderRequest::new(
            self.model.clone(),
            vec![Message::system(kind.prompt()), Message::user(format!("Query: {query}"))],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(SynthesisError::Classification)?;

        let decision = parse_decision(response.text());
        debug!(kind = kind.as_str(), decision, reply = response.text(), "Classified query");
        Ok(decision)
    }

    /// Record categories the query needs, limited to `available`.
    ///
    /// Any failure yields an empty selection.
    pub async fn select_categories(&self, query: &str, available: &CategoryMap) -> CategoryMap {
        if available.is_empty() {
            return CategoryMap::new();
        }

        let request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(prompts::category_selector(available)),
                Message::user(format!("Query: {query}")),
            ],
        )
        .with_temperature(0.0)
        .with_max_tokens(self.category_max_tokens);

        let reply = match self.provider.complete(request).await {
            Ok(response) => response.message.content,
            Err(e) => {
                warn!(error = %e, "Category selection failed");
                return CategoryMap::new();
            }
        };

        match parse_selection(&reply, available) {
            Ok(selection) => {
                debug!(categories = selection.len(), "Selected record categories");
                selection
            }
            Err(reason) => {
                warn!(%reason, "Unparseable category selection");
                CategoryMap::new()
            }
        }
    }
}

/// Only an explicit yes counts.
fn parse_decision(reply: &str) -> bool {
    reply
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .eq_ignore_ascii_case("YES")
}

fn parse_selection(reply: &str, available: &CategoryMap) -> Result<CategoryMap, String> {
    let mut body = reply.trim();
    if let Some(rest) = body.strip_prefix("```json").or_else(|| body.strip_prefix("```")) {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    let body = body.trim().replace('\'', "\"");

    let value: Value = serde_json::from_str(&body).map_err(|e| e.to_string())?;
    let Some(Value::Object(categories)) = value.get("categories") else {
        return Err("missing \"categories\" object".into());
    };

    let mut selection = CategoryMap::new();
    for (category, subs) in categories {
        let Some(known) = available.get(category) else {
            continue;
        };
        let picked: Vec<String> = subs
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|s| known.iter().any(|k| k == s))
            .map(String::from)
            .collect();
        if !picked.is_empty() {
            selection.insert(category.clone(), picked);
        }
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockProvider, PromptKind, Reply};

    fn classifier(provider: MockProvider) -> (RelevanceClassifier, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        (RelevanceClassifier::new(provider.clone(), "mini"), provider)
    }

    fn available() -> CategoryMap {
        let mut map = CategoryMap::new();
        map.insert("medications".into(), vec!["ClinicalMedication".into()]);
        map.insert(
            "vital_signs".into(),
            vec!["BloodPressureSystolic".into(), "HeartRate".into()],
        );
        map
    }

    #[test]
    fn only_explicit_yes_is_true() {
        assert!(parse_decision("YES"));
        assert!(parse_decision("  yes.\n"));
        assert!(!parse_decision("NO"));
        assert!(!parse_decision("Yes, because"));
        assert!(!parse_decision(""));
    }

    #[tokio::test]
    async fn classify_sends_short_capped_request() {
        let (c, provider) = classifier(MockProvider::replying("YES"));
        assert!(c.classify("latest statin guidance", Relevance::Search).await);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(10));
        assert_eq!(requests[0].system_prompt(), Some(prompts::SEARCH_CLASSIFIER));
    }

    #[tokio::test]
    async fn failure_falls_back_per_kind() {
        let (c, _) = classifier(MockProvider::failing());
        assert!(c.classify("anything", Relevance::Search).await);
        assert!(!c.classify("anything", Relevance::Health).await);
        assert!(matches!(
            c.try_classify("anything", Relevance::Health).await,
            Err(SynthesisError::Classification(_))
        ));
    }

    #[tokio::test]
    async fn selection_is_constrained_to_available() {
        let (c, _) = classifier(MockProvider::routed(|kind, _| match kind {
            PromptKind::CategorySelection => Reply::text(
                "```json\n{'categories': {'vital_signs': ['HeartRate', 'Made Up'], 'imaging': ['MRI']}}\n```",
            ),
            _ => Reply::text("NO"),
        }));

        let selection = c.select_categories("how is my heart rate", &available()).await;
        assert_eq!(selection.len(), 1);
        assert_eq!(selection["vital_signs"], vec!["HeartRate"]);
    }

    #[tokio::test]
    async fn garbage_selection_is_empty() {
        let (c, _) = classifier(MockProvider::replying("medications please"));
        assert!(c.select_categories("meds?", &available()).await.is_empty());

        let (c, _) = classifier(MockProvider::failing());
        assert!(c.select_categories("meds?", &available()).await.is_empty());
    }

    #[tokio::test]
    async fn empty_store_skips_selection_call() {
        let (c, provider) = classifier(MockProvider::replying("{}"));
        assert!(c.select_categories("meds?", &CategoryMap::new()).await.is_empty());
        assert_eq!(provider.call_count(), 0);
    }
}
