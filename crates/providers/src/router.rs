//! Backend construction: builds the generation provider and the optional
//! web search capability from configuration.

use std::sync::Arc;
use std::time::Duration;

use vitalchat_config::AppConfig;
use vitalchat_core::error::ProviderError;
use vitalchat_core::provider::Provider;
use vitalchat_core::search::SearchCapability;

use crate::openai_compat::OpenAiCompatProvider;
use crate::web_search::OpenAiWebSearch;

/// The external backends a synthesis run needs.
#[derive(Clone)]
pub struct Backends {
    pub provider: Arc<dyn Provider>,
    /// `None` when `[search] enabled = false`.
    pub search: Option<Arc<dyn SearchCapability>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("provider", &self.provider.name())
            .field("search", &self.search.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

/// Build backends from configuration.
///
/// Local endpoints (localhost / 127.0.0.1) may run without an API key;
/// anything else requires one.
pub fn build_from_config(config: &AppConfig) -> Result<Backends, ProviderError> {
    let api_key = match &config.api_key {
        Some(key) => key.clone(),
        None if is_local(&config.api_url) => String::new(),
        None => {
            return Err(ProviderError::NotConfigured(
                "No API key. Set VITALCHAT_API_KEY or OPENAI_API_KEY, or add api_key to config.toml"
                    .into(),
            ));
        }
    };

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let name = provider_name(&config.api_url);

    let provider: Arc<dyn Provider> = Arc::new(
        OpenAiCompatProvider::new(name, &config.api_url, &api_key).with_timeout(timeout),
    );

    let search: Option<Arc<dyn SearchCapability>> = if config.search.enabled {
        Some(Arc::new(
            OpenAiWebSearch::new(&config.api_url, &api_key)
                .with_model(&config.search.model)
                .with_context_size(&config.search.context_size)
                .with_timeout(timeout),
        ))
    } else {
        None
    };

    Ok(Backends { provider, search })
}

fn is_local(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1")
}

/// Derive a provider name from well-known base URLs.
fn provider_name(url: &str) -> &'static str {
    if url.contains("api.openai.com") {
        "openai"
    } else if url.contains("openrouter.ai") {
        "openrouter"
    } else if url.contains(":11434") {
        "ollama"
    } else {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_for_remote_endpoint_is_rejected() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn local_endpoint_needs_no_key() {
        let config = AppConfig {
            api_url: "http://localhost:11434/v1".into(),
            ..AppConfig::default()
        };
        let backends = build_from_config(&config).unwrap();
        assert_eq!(backends.provider.name(), "ollama");
    }

    #[test]
    fn build_with_key_includes_search() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let backends = build_from_config(&config).unwrap();
        assert_eq!(backends.provider.name(), "openai");
        assert_eq!(
            backends.search.unwrap().name(),
            "gpt-4o-mini-search-preview"
        );
    }

    #[test]
    fn search_can_be_disabled() {
        let mut config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        config.search.enabled = false;
        let backends = build_from_config(&config).unwrap();
        assert!(backends.search.is_none());
    }

    #[test]
    fn provider_names() {
        assert_eq!(provider_name("https://openrouter.ai/api/v1"), "openrouter");
        assert_eq!(provider_name("http://vllm.internal:8000/v1"), "custom");
    }
}
