//! Web search via OpenAI search-preview models.
//!
//! The search model answers in prose and reports its sources as
//! `url_citation` annotations. When no annotations come back, URLs are
//! scraped from the answer text instead. Either way the list is cleaned
//! (trailing punctuation, `utm_source=openai` tracking) and deduplicated.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use vitalchat_core::error::SearchError;
use vitalchat_core::search::{SearchCapability, SearchResponse};

use crate::openai_compat::http_client;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\]\[]+"#).expect("valid URL pattern"));

pub struct OpenAiWebSearch {
    base_url: String,
    api_key: String,
    model: String,
    context_size: String,
    client: reqwest::Client,
}

impl OpenAiWebSearch {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: "gpt-4o-mini-search-preview".into(),
            context_size: "high".into(),
            client: http_client(Duration::from_secs(120)),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// `low`, `medium` or `high`.
    pub fn with_context_size(mut self, size: impl Into<String>) -> Self {
        self.context_size = size.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    fn parse_response(api: SearchApiResponse) -> Result<SearchResponse, SearchError> {
        let message = api
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| SearchError::Malformed("No choices in response".into()))?;

        let answer = message.content.unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(SearchError::Malformed("Search returned no answer".into()));
        }

        let mut urls: Vec<String> = message
            .annotations
            .into_iter()
            .filter_map(|a| a.url_citation.map(|c| c.url))
            .collect();
        if urls.is_empty() {
            urls = extract_urls(&answer);
        }

        Ok(SearchResponse {
            answer,
            sources: clean_urls(urls),
        })
    }
}

/// All http(s) URLs appearing in `text`, in order.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strip trailing punctuation and OpenAI tracking parameters, then dedupe
/// preserving first occurrence.
pub fn clean_urls(urls: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(urls.len());
    for url in urls {
        let mut url = url
            .trim_end_matches(['.', ',', ';', '!', '?', ')'])
            .to_string();
        if url.contains("?utm_source=openai") {
            url = url.replace("?utm_source=openai", "");
        } else if url.contains("&utm_source=openai") {
            url = url.replace("&utm_source=openai", "");
        }
        if !url.is_empty() && !cleaned.contains(&url) {
            cleaned.push(url);
        }
    }
    cleaned
}

#[async_trait]
impl SearchCapability for OpenAiWebSearch {
    fn name(&self) -> &str {
        &self.model
    }

    async fn search(&self, query: &str) -> Result<SearchResponse, SearchError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "web_search_options": { "search_context_size": self.context_size },
            "messages": [{ "role": "user", "content": query }],
        });

        debug!(model = %self.model, "Sending web search request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(e.to_string())
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Search endpoint returned error");
            return Err(SearchError::ApiError {
                status_code: status,
                message,
            });
        }

        let api: SearchApiResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Malformed(e.to_string()))?;

        Self::parse_response(api)
    }
}

// --- API types (internal) ---

#[derive(Debug, Deserialize)]
struct SearchApiResponse {
    choices: Vec<SearchChoice>,
}

#[derive(Debug, Deserialize)]
struct SearchChoice {
    message: SearchMessage,
}

#[derive(Debug, Deserialize)]
struct SearchMessage {
    content: Option<String>,
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    #[serde(default)]
    url_citation: Option<UrlCitation>,
}

#[derive(Debug, Deserialize)]
struct UrlCitation {
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_tracking_and_punctuation() {
        let urls = vec![
            "https://www.heart.org/en/health-topics?utm_source=openai".to_string(),
            "https://www.mayoclinic.org/resting-hr).".to_string(),
            "https://example.com/a?x=1&utm_source=openai".to_string(),
        ];
        assert_eq!(
            clean_urls(urls),
            vec![
                "https://www.heart.org/en/health-topics",
                "https://www.mayoclinic.org/resting-hr",
                "https://example.com/a?x=1",
            ]
        );
    }

    #[test]
    fn clean_dedupes_preserving_order() {
        let urls = vec![
            "https://b.org/".to_string(),
            "https://a.org/".to_string(),
            "https://b.org/.".to_string(),
        ];
        assert_eq!(clean_urls(urls), vec!["https://b.org/", "https://a.org/"]);
    }

    #[test]
    fn extract_urls_from_prose() {
        let text = "See https://www.cdc.gov/bloodpressure/facts.htm and (https://nih.gov/x).";
        let urls = clean_urls(extract_urls(text));
        assert_eq!(
            urls,
            vec!["https://www.cdc.gov/bloodpressure/facts.htm", "https://nih.gov/x"]
        );
    }

    #[test]
    fn annotations_take_precedence_over_text() {
        let data = r#"{
            "choices": [{"message": {
                "content": "Normal resting heart rate is 60-100 bpm (https://text.example/ignored).",
                "annotations": [
                    {"type": "url_citation", "url_citation": {"url": "https://www.heart.org/rhr?utm_source=openai", "title": "AHA"}}
                ]
            }}]
        }"#;
        let api: SearchApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiWebSearch::parse_response(api).unwrap();
        assert!(resp.answer.starts_with("Normal resting"));
        assert_eq!(resp.sources, vec!["https://www.heart.org/rhr"]);
    }

    #[test]
    fn falls_back_to_text_urls_without_annotations() {
        let data = r#"{"choices": [{"message": {"content": "Per https://www.nhs.uk/hr, yes."}}]}"#;
        let api: SearchApiResponse = serde_json::from_str(data).unwrap();
        let resp = OpenAiWebSearch::parse_response(api).unwrap();
        assert_eq!(resp.sources, vec!["https://www.nhs.uk/hr"]);
    }

    #[test]
    fn empty_answer_is_malformed() {
        let api: SearchApiResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": ""}}]}"#).unwrap();
        assert!(matches!(
            OpenAiWebSearch::parse_response(api),
            Err(SearchError::Malformed(_))
        ));
    }

    #[test]
    fn builder_sets_model_and_context() {
        let search = OpenAiWebSearch::new("https://api.openai.com/v1/", "sk")
            .with_model("gpt-4o-search-preview")
            .with_context_size("low");
        assert_eq!(search.name(), "gpt-4o-search-preview");
        assert_eq!(search.context_size, "low");
        assert_eq!(search.base_url, "https://api.openai.com/v1");
    }
}
