//! Shared mocks for synthesis tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use vitalchat_core::error::{ProviderError, SearchError, StoreError};
use vitalchat_core::health::{
    CategoryMap, HealthRecordStore, HealthRecords, MetricKind, MetricWindow, MobileMetricsStore,
};
use vitalchat_core::message::Message;
use vitalchat_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use vitalchat_core::search::{SearchCapability, SearchResponse};

use crate::prompts;

/// Which fixed prompt a request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    SearchClassifier,
    HealthClassifier,
    CategorySelection,
    ChunkSummary,
    DirectSummary,
    CombineSummary,
    Other,
}

impl PromptKind {
    pub fn of(request: &ProviderRequest) -> Self {
        match request.system_prompt() {
            Some(p) if p == prompts::SEARCH_CLASSIFIER => PromptKind::SearchClassifier,
            Some(p) if p == prompts::HEALTH_CLASSIFIER => PromptKind::HealthClassifier,
            Some(p) if p == prompts::CHUNK_SUMMARY => PromptKind::ChunkSummary,
            Some(p) if p == prompts::DIRECT_SUMMARY => PromptKind::DirectSummary,
            Some(p) if p == prompts::COMBINE_SUMMARY => PromptKind::CombineSummary,
            Some(p) if p.contains("determine which health categories") => {
                PromptKind::CategorySelection
            }
            _ => PromptKind::Other,
        }
    }
}

/// What the mock answers to one request.
pub struct Reply {
    delay: Duration,
    outcome: Result<String, ProviderError>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(text.into()),
        }
    }

    pub fn fail() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(ProviderError::Network("connection reset".into())),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Route = dyn Fn(PromptKind, &ProviderRequest) -> Reply + Send + Sync;

/// A provider that answers by prompt kind and records every request.
pub struct MockProvider {
    route: Box<Route>,
    requests: Mutex<Vec<ProviderRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn routed(
        route: impl Fn(PromptKind, &ProviderRequest) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self {
            route: Box::new(route),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: &'static str) -> Self {
        Self::routed(move |_, _| Reply::text(text))
    }

    pub fn failing() -> Self {
        Self::routed(|_, _| Reply::fail())
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_of(&self, kind: PromptKind) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| PromptKind::of(r) == kind)
            .count()
    }

    /// Highest number of concurrent `complete` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Text of the last (user) message of a request.
pub fn user_text(request: &ProviderRequest) -> &str {
    request
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let kind = PromptKind::of(&request);
        let reply = (self.route)(kind, &request);
        self.requests.lock().unwrap().push(request);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        reply.outcome.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// Search capability with a fixed answer.
pub struct MockSearch {
    outcome: Result<SearchResponse, SearchError>,
    calls: AtomicUsize,
}

impl MockSearch {
    pub fn answering(answer: &str, sources: &[&str]) -> Self {
        Self {
            outcome: Ok(SearchResponse {
                answer: answer.into(),
                sources: sources.iter().map(|s| s.to_string()).collect(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Err(SearchError::Timeout("search took too long".into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchCapability for MockSearch {
    fn name(&self) -> &str {
        "mock_search"
    }

    async fn search(&self, _query: &str) -> Result<SearchResponse, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// A store whose every read fails.
pub struct BrokenStore;

#[async_trait]
impl HealthRecordStore for BrokenStore {
    async fn available_categories(&self) -> Result<CategoryMap, StoreError> {
        Err(StoreError::Unavailable("export is locked".into()))
    }

    async fn query(&self, _: &CategoryMap, _: usize) -> Result<HealthRecords, StoreError> {
        Err(StoreError::Unavailable("export is locked".into()))
    }
}

#[async_trait]
impl MobileMetricsStore for BrokenStore {
    async fn window(
        &self,
        _: MetricKind,
        _: NaiveDate,
        _: NaiveDate,
    ) -> Result<MetricWindow, StoreError> {
        Err(StoreError::Unavailable("export is locked".into()))
    }
}
