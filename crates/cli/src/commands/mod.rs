//! CLI subcommands and the runtime they share.

pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod init;
pub mod process_mobile;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;
use vitalchat_config::AppConfig;
use vitalchat_core::error::ProviderError;
use vitalchat_core::provider::{Provider, ProviderRequest};
use vitalchat_core::status::{ProgressStage, StatusRegister};
use vitalchat_health::{JsonRecordStore, ProcessedMetricsStore};
use vitalchat_synthesis::{SynthesisOrchestrator, SynthesisResult};

/// Everything a question needs: config, generator and orchestrator.
pub struct Runtime {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub orchestrator: SynthesisOrchestrator,
}

impl Runtime {
    pub async fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

        let backends = match vitalchat_providers::build_from_config(&config) {
            Ok(backends) => backends,
            Err(e) => {
                eprintln!();
                eprintln!("  ERROR: {e}");
                eprintln!();
                eprintln!("  Set one of these environment variables:");
                eprintln!("    VITALCHAT_API_KEY=sk-...");
                eprintln!("    OPENAI_API_KEY=sk-...");
                eprintln!();
                eprintln!("  Or add api_key to {}", AppConfig::config_path().display());
                eprintln!();
                return Err(e.into());
            }
        };

        let mut orchestrator =
            SynthesisOrchestrator::from_config(backends.provider.clone(), &config);
        if let Some(search) = backends.search {
            orchestrator = orchestrator.with_search(search);
        }

        // A store that fails to load is left out; the assistant still answers
        if let Some(path) = &config.health.records_path {
            match JsonRecordStore::open(path).await {
                Ok(store) => orchestrator = orchestrator.with_records(Arc::new(store)),
                Err(e) => warn!(error = %e, "Health records unavailable"),
            }
        }
        if let Some(path) = &config.health.mobile_path {
            match ProcessedMetricsStore::open(path).await {
                Ok(store) => orchestrator = orchestrator.with_mobile(Arc::new(store)),
                Err(e) => warn!(error = %e, "Mobile metrics unavailable"),
            }
        }

        Ok(Self {
            config,
            provider: backends.provider,
            orchestrator,
        })
    }

    /// Generate the final answer from synthesized messages.
    pub async fn answer(&self, result: &SynthesisResult) -> Result<String, ProviderError> {
        let request = ProviderRequest::new(self.config.default_model.clone(), result.messages.clone())
            .with_temperature(self.config.default_temperature)
            .with_max_tokens(self.config.default_max_tokens);
        let response = self.provider.complete(request).await?;
        Ok(response.message.content)
    }
}

/// Print progress stages to stderr until the register returns to idle.
pub fn watch_progress(status: &StatusRegister) -> JoinHandle<()> {
    let mut rx = status.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ProgressStage::Idle) | Err(RecvError::Closed) => break,
                Ok(stage) => eprint!("\r\x1b[2K  {}...", stage.describe()),
                Err(RecvError::Lagged(_)) => continue,
            }
        }
        eprint!("\r\x1b[2K");
    })
}
