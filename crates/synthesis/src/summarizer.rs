//! Chunked map-reduce summarization of oversized health payloads.
//!
//! ```text
//! payload ─┬─ fits budget ──► one summary call ──────────────────────► Direct
//!          │                   (failure: payload unchanged)           Passthrough
//!          └─ over budget ──► split ─► chunk calls (bounded pool) ─► join in index order
//!                                                                     │
//!                             concatenation over combine budget? ─────┤
//!                               yes: one combine call ──────────────► Reduced
//!                                    (failure: concatenation) ──────► Concatenated
//!                               no ─────────────────────────────────► Concatenated
//! ```
//!
//! The whole operation runs under one deadline. On expiry the in-flight chunk
//! calls are dropped and a categorized listing of the payload is returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use vitalchat_config::SynthesisConfig;
use vitalchat_core::error::ProviderError;
use vitalchat_core::message::Message;
use vitalchat_core::provider::{Provider, ProviderRequest};
use vitalchat_health::{HealthPayload, SectionSpan};

use crate::error::SynthesisError;
use crate::prompts;
use crate::token::TokenCounter;

const SUMMARY_TEMPERATURE: f32 = 0.2;

/// How a [`Summary`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// One call over a payload within budget.
    Direct,
    /// The direct call failed; the payload is returned as is.
    Passthrough,
    /// Chunk summaries joined in order.
    Concatenated,
    /// Chunk summaries merged by one combine call.
    Reduced,
    /// The deadline expired; a categorized listing stands in.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub text: String,
    /// Whether `text` fits the budget it was produced for.
    pub terminal: bool,
    pub kind: SummaryKind,
    /// Chunks summarized (0 for the direct path).
    pub chunks: usize,
}

pub struct ChunkSummarizer {
    provider: Arc<dyn Provider>,
    counter: Arc<dyn TokenCounter>,
    model: String,
    max_tokens: u32,
    combine_budget: usize,
    deadline: Duration,
    workers: Arc<Semaphore>,
}

impl ChunkSummarizer {
    pub fn new(
        provider: Arc<dyn Provider>,
        counter: Arc<dyn TokenCounter>,
        model: impl Into<String>,
    ) -> Self {
        let defaults = SynthesisConfig::default();
        Self {
            provider,
            counter,
            model: model.into(),
            max_tokens: defaults.summary_max_tokens,
            combine_budget: defaults.combine_token_budget,
            deadline: Duration::from_secs(defaults.summary_deadline_secs),
            workers: Arc::new(Semaphore::new(defaults.summary_workers)),
        }
    }

    pub fn from_config(
        provider: Arc<dyn Provider>,
        counter: Arc<dyn TokenCounter>,
        model: impl Into<String>,
        config: &SynthesisConfig,
    ) -> Self {
        Self::new(provider, counter, model)
            .with_max_tokens(config.summary_max_tokens)
            .with_combine_budget(config.combine_token_budget)
            .with_deadline(Duration::from_secs(config.summary_deadline_secs))
            .with_workers(config.summary_workers)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Concatenations above this many tokens get one combine pass.
    pub fn with_combine_budget(mut self, budget: usize) -> Self {
        self.combine_budget = budget;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Width of the chunk worker pool, shared by every call on this summarizer.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    /// Reduce `payload` to fit `budget` tokens. Never fails.
    pub async fn summarize(&self, query: &str, payload: &HealthPayload, budget: usize) -> Summary {
        let started = Instant::now();
        let (text, spans) = payload.render();

        match tokio::time::timeout(self.deadline, self.run(query, &text, &spans, budget)).await {
            Ok(summary) => {
                info!(
                    kind = ?summary.kind,
                    chunks = summary.chunks,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Health data summarized"
                );
                summary
            }
            Err(_) => {
                warn!(error = %SynthesisError::SummaryTimeout(self.deadline), "Using categorized listing");
                let listing = format!(
                    "{}\n{}",
                    prompts::SUMMARY_UNAVAILABLE,
                    payload.categorized_listing()
                );
                self.finish(listing, SummaryKind::TimedOut, 0, budget)
            }
        }
    }

    async fn run(&self, query: &str, text: &str, spans: &[SectionSpan], budget: usize) -> Summary {
        let tokens = self.counter.count(text);
        if tokens <= budget {
            let request = self.request(prompts::DIRECT_SUMMARY, prompts::direct_request(query, text));
            return match self.provider.complete(request).await {
                Ok(response) => self.finish(response.message.content, SummaryKind::Direct, 0, budget),
                Err(e) => {
                    warn!(error = %e, "Summary failed, keeping health data unsummarized");
                    self.finish(text.to_string(), SummaryKind::Passthrough, 0, budget)
                }
            };
        }

        let chunks = self.counter.split(text, budget);
        let total = chunks.len();
        info!(tokens, budget, chunks = total, "Summarizing health data in chunks");

        let labels: Vec<String> = chunks
            .iter()
            .map(|chunk| category_at(spans, chunk.start).to_string())
            .collect();

        let mut tasks = JoinSet::new();
        for chunk in chunks {
            let provider = Arc::clone(&self.provider);
            let workers = Arc::clone(&self.workers);
            let category = labels[chunk.index].clone();
            let request = self.request(
                prompts::CHUNK_SUMMARY,
                prompts::chunk_request(&category, chunk.index, total, &chunk.text),
            );

            tasks.spawn(async move {
                let outcome = match workers.acquire_owned().await {
                    Ok(_permit) => provider.complete(request).await.map(|r| r.message.content),
                    Err(_) => Err(ProviderError::NotConfigured("summary worker pool closed".into())),
                };
                (chunk.index, outcome)
            });
        }

        let mut parts: Vec<Option<String>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(summary))) => {
                    debug!(chunk = index, "Chunk summarized");
                    parts[index] = Some(summary);
                }
                Ok((index, Err(e))) => {
                    let err = SynthesisError::ChunkSummary {
                        index,
                        category: labels[index].clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "Chunk summary failed");
                }
                Err(e) => warn!(error = %e, "Chunk task aborted"),
            }
        }

        let joined = parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| part.unwrap_or_else(|| prompts::chunk_placeholder(&labels[i])))
            .collect::<Vec<_>>()
            .join("\n\n");

        if self.counter.count(&joined) <= self.combine_budget {
            return self.finish(joined, SummaryKind::Concatenated, total, budget);
        }

        let request = self.request(prompts::COMBINE_SUMMARY, prompts::combine_request(query, &joined));
        match self.provider.complete(request).await {
            Ok(response) => self.finish(response.message.content, SummaryKind::Reduced, total, budget),
            Err(e) => {
                warn!(error = %e, "Combine pass failed, keeping chunk summaries");
                self.finish(joined, SummaryKind::Concatenated, total, budget)
            }
        }
    }

    fn request(&self, system: &str, user: String) -> ProviderRequest {
        ProviderRequest::new(self.model.clone(), vec![Message::system(system), Message::user(user)])
            .with_temperature(SUMMARY_TEMPERATURE)
            .with_max_tokens(self.max_tokens)
    }

    fn finish(&self, text: String, kind: SummaryKind, chunks: usize, budget: usize) -> Summary {
        Summary {
            terminal: self.counter.count(&text) <= budget,
            text,
            kind,
            chunks,
        }
    }
}

/// Label of the section containing byte offset `at`.
fn category_at(spans: &[SectionSpan], at: usize) -> &str {
    spans
        .iter()
        .rev()
        .find(|span| span.start <= at)
        .map_or("health data", |span| span.category.as_str())
}
