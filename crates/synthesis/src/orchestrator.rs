//! The synthesis orchestrator.
//!
//! ```text
//! query ──► status: processing
//!             ├── spawn ── WebRetriever ────┐
//!             └── spawn ── HealthRetriever ─┤ (either order)
//!                                           ▼
//!              health over budget? ── ChunkSummarizer
//!                                           ▼
//!              assemble messages ──► status: idle (guard drop)
//! ```
//!
//! Source-level failures never reach the caller; they only remove that
//! source from the result. The one error returned is a malformed request.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vitalchat_config::AppConfig;
use vitalchat_core::health::{HealthRecordStore, MobileMetricsStore};
use vitalchat_core::message::{Message, Role};
use vitalchat_core::provider::Provider;
use vitalchat_core::search::SearchCapability;
use vitalchat_core::status::{ProgressStage, StatusRegister};
use vitalchat_health::MetricDetector;

use crate::classifier::RelevanceClassifier;
use crate::error::SynthesisError;
use crate::prompts;
use crate::retriever::{HealthRetriever, SourceResult, SourceStatus, WebRetriever};
use crate::summarizer::{ChunkSummarizer, SummaryKind};
use crate::token::{TokenCounter, counter_from_config};

/// A source that contributed to the augmented turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Web,
    Health,
}

/// Messages ready for generation plus what went into them.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Prior turns followed by the (possibly augmented) user turn.
    pub messages: Vec<Message>,
    /// Contributing sources, web first.
    pub sources: Vec<SourceKind>,
    /// Web citations, deduplicated.
    pub citations: Vec<String>,
    pub web: SourceStatus,
    pub health: SourceStatus,
    /// Set when the health payload had to be summarized.
    pub summary: Option<SummaryKind>,
}

impl SynthesisResult {
    /// Content of the final user turn.
    pub fn prompt(&self) -> &str {
        self.messages.last().map_or("", |m| m.content.as_str())
    }

    pub fn used(&self, kind: SourceKind) -> bool {
        self.sources.contains(&kind)
    }
}

pub struct SynthesisOrchestrator {
    web: WebRetriever,
    health: HealthRetriever,
    summarizer: ChunkSummarizer,
    counter: Arc<dyn TokenCounter>,
    health_budget: usize,
    status: Arc<StatusRegister>,
}

impl SynthesisOrchestrator {
    /// An orchestrator with no sources attached and default budgets.
    pub fn new(
        provider: Arc<dyn Provider>,
        counter: Arc<dyn TokenCounter>,
        classifier_model: impl Into<String>,
        summary_model: impl Into<String>,
    ) -> Self {
        let classifier = Arc::new(RelevanceClassifier::new(provider.clone(), classifier_model));
        Self {
            web: WebRetriever::new(classifier.clone()),
            health: HealthRetriever::new(classifier),
            summarizer: ChunkSummarizer::new(provider, counter.clone(), summary_model),
            counter,
            health_budget: vitalchat_config::SynthesisConfig::default().health_token_budget,
            status: Arc::new(StatusRegister::default()),
        }
    }

    /// Wire classifier, budgets and summarizer from configuration.
    ///
    /// Stores and search are attached separately.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let classifier = Arc::new(RelevanceClassifier::from_config(
            provider.clone(),
            &config.classifier,
        ));
        let counter = counter_from_config(&config.synthesis);
        Self {
            web: WebRetriever::new(classifier.clone()),
            health: HealthRetriever::new(classifier)
                .with_detector(MetricDetector::new(config.health.default_window_days))
                .with_max_records(config.health.max_records_per_subcategory),
            summarizer: ChunkSummarizer::from_config(
                provider,
                counter.clone(),
                config.summary_model(),
                &config.synthesis,
            ),
            counter,
            health_budget: config.synthesis.health_token_budget,
            status: Arc::new(StatusRegister::default()),
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchCapability>) -> Self {
        self.web = self.web.with_search(search);
        self
    }

    pub fn with_records(mut self, store: Arc<dyn HealthRecordStore>) -> Self {
        self.health = self.health.with_records(store);
        self
    }

    pub fn with_mobile(mut self, store: Arc<dyn MobileMetricsStore>) -> Self {
        self.health = self.health.with_mobile(store);
        self
    }

    /// Anchor metric windows at `date` instead of today.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.health = self.health.with_reference_date(date);
        self
    }

    pub fn with_health_budget(mut self, budget: usize) -> Self {
        self.health_budget = budget;
        self
    }

    pub fn with_summarizer(mut self, summarizer: ChunkSummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Share a status register with other components.
    pub fn with_status(mut self, status: Arc<StatusRegister>) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> &Arc<StatusRegister> {
        &self.status
    }

    /// Gather context for `query` and build the messages to generate from.
    ///
    /// `conversation` holds the prior turns, oldest first.
    pub async fn synthesize(
        &self,
        query: &str,
        conversation: &[Message],
    ) -> Result<SynthesisResult, SynthesisError> {
        validate(query, conversation)?;

        let guard = self.status.enter();
        let started = Instant::now();

        // Declared after the guard so a cancelled request aborts both
        // retrievers before the register is reset
        let mut web_task = {
            let web = self.web.clone();
            let status = self.status.clone();
            let query = query.to_string();
            AbortOnDrop(tokio::spawn(async move { web.retrieve(&query, &status).await }))
        };
        let mut health_task = {
            let health = self.health.clone();
            let status = self.status.clone();
            let query = query.to_string();
            AbortOnDrop(tokio::spawn(async move { health.retrieve(&query, &status).await }))
        };
        let (web, health) = tokio::join!(&mut web_task.0, &mut health_task.0);

        let web = web.unwrap_or_else(|e| SourceResult::Failed(SynthesisError::retrieval("web", e)));
        let health =
            health.unwrap_or_else(|e| SourceResult::Failed(SynthesisError::retrieval("health", e)));

        let web_status = web.status();
        let health_status = health.status();
        for (name, status) in [("web", &web_status), ("health", &health_status)] {
            if let SourceStatus::Failed(reason) = status {
                warn!(source = name, %reason, "Continuing without source");
            }
        }

        let web = web.fetched();
        let mut summary = None;
        let health_text = match health.fetched() {
            Some(fetched) => {
                let (text, _) = fetched.payload.render();
                let tokens = self.counter.count(&text);
                if tokens > self.health_budget {
                    guard.set(ProgressStage::SummarizingHealthData);
                    let reduced = self
                        .summarizer
                        .summarize(query, &fetched.payload, self.health_budget)
                        .await;
                    summary = Some(reduced.kind);
                    Some(reduced.text)
                } else {
                    debug!(tokens, "Health data within budget");
                    Some(text)
                }
            }
            None => None,
        };

        let (augmented, sources) = match (&web, &health_text) {
            (Some(w), Some(h)) => (
                prompts::combined(query, &w.text, h),
                vec![SourceKind::Web, SourceKind::Health],
            ),
            (Some(w), None) => (prompts::web_only(query, &w.text), vec![SourceKind::Web]),
            (None, Some(h)) => (prompts::health_only(query, h), vec![SourceKind::Health]),
            (None, None) => (query.to_string(), Vec::new()),
        };

        let mut messages = conversation.to_vec();
        if !sources.is_empty() {
            let instruction = prompts::source_instruction(web.is_some(), health_text.is_some());
            let at = messages
                .iter()
                .position(|m| m.role != Role::System)
                .unwrap_or(messages.len());
            messages.insert(at, Message::system(instruction));
        }
        messages.push(Message::user(augmented));

        info!(
            web = %web_status,
            health = %health_status,
            summarized = summary.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Synthesis complete"
        );

        Ok(SynthesisResult {
            messages,
            sources,
            citations: web.map(|w| w.sources).unwrap_or_default(),
            web: web_status,
            health: health_status,
            summary,
        })
    }
}

/// Aborts the task when dropped, so retrievers never outlive their request.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn validate(query: &str, conversation: &[Message]) -> Result<(), SynthesisError> {
    if query.trim().is_empty() {
        return Err(SynthesisError::Contract("query is empty".into()));
    }
    if let Some(first_turn) = conversation.iter().position(|m| m.role != Role::System) {
        if conversation[first_turn..].iter().any(|m| m.role == Role::System) {
            return Err(SynthesisError::Contract(
                "system messages must precede the conversation turns".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{BrokenStore, MockProvider, MockSearch, PromptKind, Reply};
    use crate::token::HeuristicCounter;
    use serde_json::json;
    use std::time::Duration;
    use vitalchat_core::health::DailyStat;
    use vitalchat_health::{DailySeries, JsonRecordStore, ProcessedMetricsStore, ProcessedMobileData};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn orchestrator(provider: Arc<MockProvider>) -> SynthesisOrchestrator {
        SynthesisOrchestrator::new(provider, Arc::new(HeuristicCounter::new()), "mini", "summary")
    }

    fn mobile() -> Arc<ProcessedMetricsStore> {
        let daily = (1..=20)
            .map(|d| DailyStat {
                date: day(d),
                avg: 58.0 + d as f64 / 10.0,
                min: 48.0,
                max: 120.0,
                sum: 0.0,
                count: 50,
            })
            .collect();
        Arc::new(ProcessedMetricsStore::new(ProcessedMobileData {
            last_updated: day(20).and_hms_opt(6, 0, 0).unwrap(),
            date_range: None,
            total_days: 20,
            categories_processed: vec!["heart_rate".into()],
            heart_rate: DailySeries { daily, trend: Default::default() },
            blood_pressure: Default::default(),
            hrv: Default::default(),
            steps: Default::default(),
        }))
    }

    fn big_records(entries: usize) -> Arc<JsonRecordStore> {
        let notes: Vec<_> = (0..entries)
            .map(|i| json!({"note": format!("visit {i}: {}", "details ".repeat(40))}))
            .collect();
        Arc::new(
            JsonRecordStore::from_value(
                "test",
                json!({"clinical_notes": {"ClinicalNote": notes}}),
            )
            .unwrap(),
        )
    }

    fn everything_relevant() -> MockProvider {
        MockProvider::routed(|kind, _| match kind {
            PromptKind::SearchClassifier | PromptKind::HealthClassifier => Reply::text("YES"),
            PromptKind::CategorySelection => {
                Reply::text(r#"{"categories": {"clinical_notes": ["ClinicalNote"]}}"#)
            }
            PromptKind::ChunkSummary => Reply::text("chunk summary"),
            PromptKind::DirectSummary | PromptKind::CombineSummary => Reply::text("summary"),
            PromptKind::Other => Reply::fail(),
        })
    }

    #[tokio::test]
    async fn heart_rate_trend_uses_both_sources() {
        let provider = Arc::new(MockProvider::routed(|kind, _| match kind {
            PromptKind::SearchClassifier => Reply::text("YES"),
            _ => Reply::text("NO"),
        }));
        let search = Arc::new(MockSearch::answering(
            "A normal resting heart rate for adults is 60 to 100 bpm.",
            &["https://www.heart.org/en/healthy-living"],
        ));
        let orch = orchestrator(provider)
            .with_search(search)
            .with_mobile(mobile())
            .with_reference_date(day(20));

        let result = orch
            .synthesize("What's my resting heart rate trend this week and is that normal?", &[])
            .await
            .unwrap();

        assert_eq!(result.sources, vec![SourceKind::Web, SourceKind::Health]);
        let prompt = result.prompt();
        assert!(prompt.find("WEB INFORMATION:").unwrap() < prompt.find("PERSONAL HEALTH DATA:").unwrap());
        assert!(prompt.contains("HEART RATE DATA (2026-01-13 to 2026-01-20)"));
        assert!(!prompt.contains("2026-01-12:"));
        assert_eq!(result.citations, vec!["https://www.heart.org/en/healthy-living"]);
        assert_eq!(result.messages[0].role, Role::System);
        assert_eq!(orch.status().get(), ProgressStage::Idle);
    }

    #[tokio::test]
    async fn general_question_passes_through() {
        let provider = Arc::new(MockProvider::replying("NO"));
        let search = Arc::new(MockSearch::answering("unused", &[]));
        let orch = orchestrator(provider)
            .with_search(search.clone())
            .with_records(big_records(1))
            .with_mobile(mobile());

        let history = vec![Message::user("hi"), Message::assistant("Hello!")];
        let result = orch.synthesize("What is hypertension?", &history).await.unwrap();

        assert!(result.sources.is_empty());
        assert_eq!(result.messages.len(), 3);
        assert_eq!(result.prompt(), "What is hypertension?");
        assert_eq!(result.web, SourceStatus::Unneeded);
        assert_eq!(result.health, SourceStatus::Unneeded);
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn no_stores_and_no_search_is_plain_chat() {
        let provider = Arc::new(MockProvider::replying("YES"));
        let orch = orchestrator(provider.clone());
        let result = orch.synthesize("What are my medications?", &[]).await.unwrap();
        assert!(result.sources.is_empty());
        assert_eq!(result.prompt(), "What are my medications?");
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn classifier_outage_searches_but_keeps_health_private() {
        let search = Arc::new(MockSearch::answering("news", &[]));
        let orch = orchestrator(Arc::new(MockProvider::failing()))
            .with_search(search.clone())
            .with_records(big_records(1));

        let result = orch.synthesize("what are my medications?", &[]).await.unwrap();
        assert_eq!(search.call_count(), 1);
        assert_eq!(result.web, SourceStatus::Fetched);
        assert_eq!(result.health, SourceStatus::Unneeded);
        assert_eq!(result.sources, vec![SourceKind::Web]);
    }

    #[tokio::test]
    async fn failed_source_does_not_abort_sibling() {
        let orch = orchestrator(Arc::new(everything_relevant()))
            .with_search(Arc::new(MockSearch::failing()))
            .with_records(big_records(2));

        let result = orch.synthesize("summarize my clinical notes", &[]).await.unwrap();
        assert!(matches!(result.web, SourceStatus::Failed(_)));
        assert_eq!(result.sources, vec![SourceKind::Health]);
        assert!(result.prompt().starts_with("PERSONAL HEALTH DATA:"));
        assert_eq!(orch.status().get(), ProgressStage::Idle);

        let orch = orchestrator(Arc::new(everything_relevant()))
            .with_search(Arc::new(MockSearch::answering("web answer", &[])))
            .with_records(Arc::new(BrokenStore));
        let result = orch.synthesize("summarize my clinical notes", &[]).await.unwrap();
        assert!(matches!(result.health, SourceStatus::Failed(_)));
        assert_eq!(result.sources, vec![SourceKind::Web]);
        assert_eq!(orch.status().get(), ProgressStage::Idle);
    }

    #[tokio::test]
    async fn oversized_health_payload_is_summarized() {
        let provider = Arc::new(everything_relevant());
        let orch = orchestrator(provider.clone())
            .with_records(big_records(25))
            .with_health_budget(1_000);

        let result = orch.synthesize("summarize my clinical notes", &[]).await.unwrap();
        assert_eq!(result.summary, Some(SummaryKind::Concatenated));
        assert!(provider.calls_of(PromptKind::ChunkSummary) > 1);
        assert!(result.prompt().contains("chunk summary"));
        assert!(!result.prompt().contains("details details"));
    }

    #[tokio::test]
    async fn status_sequence_ends_idle() {
        let provider = Arc::new(everything_relevant());
        let orch = orchestrator(provider)
            .with_search(Arc::new(MockSearch::answering("web", &[])))
            .with_records(big_records(25))
            .with_health_budget(1_000);
        let mut rx = orch.status().subscribe();

        orch.synthesize("summarize my clinical notes", &[]).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(stage) = rx.try_recv() {
            seen.push(stage);
        }
        assert_eq!(seen.first(), Some(&ProgressStage::Processing));
        assert_eq!(seen.last(), Some(&ProgressStage::Idle));
        for stage in [
            ProgressStage::SearchingWeb,
            ProgressStage::AnalyzingWebData,
            ProgressStage::RetrievingHealthData,
            ProgressStage::AnalyzingHealthData,
            ProgressStage::SummarizingHealthData,
        ] {
            assert!(seen.contains(&stage), "missing {stage}");
        }
        let at = |s| seen.iter().position(|x| *x == s).unwrap();
        assert!(at(ProgressStage::SearchingWeb) < at(ProgressStage::AnalyzingWebData));
        assert!(at(ProgressStage::RetrievingHealthData) < at(ProgressStage::AnalyzingHealthData));
        assert!(at(ProgressStage::AnalyzingHealthData) < at(ProgressStage::SummarizingHealthData));
    }

    #[tokio::test(start_paused = true)]
    async fn summary_deadline_yields_categorized_fallback() {
        let provider = Arc::new(MockProvider::routed(|kind, _| match kind {
            PromptKind::HealthClassifier => Reply::text("YES"),
            PromptKind::CategorySelection => {
                Reply::text(r#"{"categories": {"clinical_notes": ["ClinicalNote"]}}"#)
            }
            PromptKind::ChunkSummary => Reply::text("late").after(Duration::from_secs(1_000)),
            _ => Reply::text("NO"),
        }));
        let summarizer = ChunkSummarizer::new(provider.clone(), Arc::new(HeuristicCounter::new()), "summary")
            .with_deadline(Duration::from_secs(180));
        let orch = orchestrator(provider)
            .with_records(big_records(25))
            .with_health_budget(1_000)
            .with_summarizer(summarizer);

        let result = orch.synthesize("summarize my clinical notes", &[]).await.unwrap();
        assert_eq!(result.summary, Some(SummaryKind::TimedOut));
        assert!(result.prompt().contains(prompts::SUMMARY_UNAVAILABLE));
        assert!(result.prompt().contains("- Clinical Notes: ClinicalNote"));
        assert_eq!(orch.status().get(), ProgressStage::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_request_leaves_register_idle() {
        let provider = Arc::new(MockProvider::routed(|kind, _| match kind {
            PromptKind::SearchClassifier => Reply::text("YES").after(Duration::from_secs(10)),
            _ => Reply::text("NO"),
        }));
        let search = Arc::new(MockSearch::answering("web", &[]));
        let orch = orchestrator(provider).with_search(search.clone());

        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            orch.synthesize("latest flu guidance", &[]),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(orch.status().get(), ProgressStage::Idle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(orch.status().get(), ProgressStage::Idle);
        assert_eq!(search.call_count(), 0);
    }

    #[tokio::test]
    async fn huge_lookback_window_is_capped() {
        let orch = orchestrator(Arc::new(MockProvider::replying("NO")))
            .with_mobile(mobile())
            .with_reference_date(day(20));

        let result = orch
            .synthesize("my heart rate over the last 100000000 days", &[])
            .await
            .unwrap();
        assert_eq!(result.health, SourceStatus::Fetched);
        assert!(result.prompt().contains("HEART RATE DATA (2016-01-23 to 2026-01-20)"));
        assert_eq!(orch.status().get(), ProgressStage::Idle);
    }

    #[tokio::test]
    async fn leading_system_turns_are_kept_first() {
        let provider = Arc::new(MockProvider::routed(|kind, _| match kind {
            PromptKind::SearchClassifier => Reply::text("YES"),
            _ => Reply::text("NO"),
        }));
        let orch = orchestrator(provider).with_search(Arc::new(MockSearch::answering("web", &[])));
        let history = vec![Message::system("Be brief."), Message::user("hi")];

        let result = orch.synthesize("latest flu guidance", &history).await.unwrap();
        let roles: Vec<Role> = result.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::System, Role::User, Role::User]);
        assert_eq!(result.messages[0].content, "Be brief.");
    }

    #[tokio::test]
    async fn contract_violations_are_errors() {
        let orch = orchestrator(Arc::new(MockProvider::replying("NO")));
        assert!(matches!(
            orch.synthesize("   ", &[]).await,
            Err(SynthesisError::Contract(_))
        ));

        let history = vec![Message::user("hi"), Message::system("late system turn")];
        assert!(matches!(
            orch.synthesize("hello", &history).await,
            Err(SynthesisError::Contract(_))
        ));
        assert_eq!(orch.status().get(), ProgressStage::Idle);
    }
}
