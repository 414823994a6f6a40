//! Configuration loading, validation, and management for VitalChat.
//!
//! Loads configuration from `~/.vitalchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.vitalchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for final answer generation
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// HTTP timeout for every external call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Relevance classification
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Web search
    #[serde(default)]
    pub search: SearchConfig,

    /// Personal health data sources
    #[serde(default)]
    pub health: HealthConfig,

    /// Health payload summarization
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("classifier", &self.classifier)
            .field("search", &self.search)
            .field("health", &self.health)
            .field("synthesis", &self.synthesis)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Hard cap on the YES/NO reply
    #[serde(default = "default_classifier_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_classifier_temperature")]
    pub temperature: f32,

    /// Cap on the category-selection JSON reply
    #[serde(default = "default_category_max_tokens")]
    pub category_max_tokens: u32,
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".into()
}
fn default_classifier_max_tokens() -> u32 {
    10
}
fn default_classifier_temperature() -> f32 {
    0.1
}
fn default_category_max_tokens() -> u32 {
    500
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_classifier_model(),
            max_tokens: default_classifier_max_tokens(),
            temperature: default_classifier_temperature(),
            category_max_tokens: default_category_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_search_model")]
    pub model: String,

    /// `low`, `medium` or `high`
    #[serde(default = "default_context_size")]
    pub context_size: String,
}

fn default_true() -> bool {
    true
}
fn default_search_model() -> String {
    "gpt-4o-mini-search-preview".into()
}
fn default_context_size() -> String {
    "high".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_search_model(),
            context_size: default_context_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Structured health-record export (JSON). Absent = no record store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_path: Option<PathBuf>,

    /// Processed mobile metrics (JSON). Absent = no metrics store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_path: Option<PathBuf>,

    #[serde(default = "default_max_records")]
    pub max_records_per_subcategory: usize,

    /// Window used when the query names no time range
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,
}

fn default_max_records() -> usize {
    25
}
fn default_window_days() -> u32 {
    7
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            records_path: None,
            mobile_path: None,
            max_records_per_subcategory: default_max_records(),
            default_window_days: default_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Model for chunk summaries (falls back to `default_model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_model: Option<String>,

    /// Health payloads above this size are summarized
    #[serde(default = "default_health_budget")]
    pub health_token_budget: usize,

    /// Concatenated chunk summaries above this size get one reduce pass
    #[serde(default = "default_combine_budget")]
    pub combine_token_budget: usize,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Width of the chunk summarization pool
    #[serde(default = "default_summary_workers")]
    pub summary_workers: usize,

    #[serde(default = "default_summary_deadline")]
    pub summary_deadline_secs: u64,

    /// HuggingFace `tokenizer.json` for exact token counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

fn default_health_budget() -> usize {
    10_000
}
fn default_combine_budget() -> usize {
    4_000
}
fn default_summary_max_tokens() -> u32 {
    1_024
}
fn default_summary_workers() -> usize {
    4
}
fn default_summary_deadline() -> u64 {
    180
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            summary_model: None,
            health_token_budget: default_health_budget(),
            combine_token_budget: default_combine_budget(),
            summary_max_tokens: default_summary_max_tokens(),
            summary_workers: default_summary_workers(),
            summary_deadline_secs: default_summary_deadline(),
            tokenizer_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.vitalchat/config.toml).
    ///
    /// Also checks environment variables:
    /// - `VITALCHAT_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `VITALCHAT_MODEL`
    /// - `VITALCHAT_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("VITALCHAT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("VITALCHAT_MODEL") {
            self.default_model = model;
        }

        if let Ok(url) = std::env::var("VITALCHAT_API_URL") {
            self.api_url = url;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".vitalchat")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            return Err(ConfigError::ValidationError(
                "classifier.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let s = &self.synthesis;
        if s.health_token_budget == 0 || s.combine_token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "synthesis token budgets must be > 0".into(),
            ));
        }

        if s.combine_token_budget > s.health_token_budget {
            return Err(ConfigError::ValidationError(
                "combine_token_budget must not exceed health_token_budget".into(),
            ));
        }

        if s.summary_workers == 0 {
            return Err(ConfigError::ValidationError(
                "summary_workers must be >= 1".into(),
            ));
        }

        if s.summary_deadline_secs == 0 {
            return Err(ConfigError::ValidationError(
                "summary_deadline_secs must be >= 1".into(),
            ));
        }

        if !matches!(self.search.context_size.as_str(), "low" | "medium" | "high") {
            return Err(ConfigError::ValidationError(format!(
                "search.context_size must be low, medium or high (got '{}')",
                self.search.context_size
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Model used for summaries.
    pub fn summary_model(&self) -> &str {
        self.synthesis
            .summary_model
            .as_deref()
            .unwrap_or(&self.default_model)
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            classifier: ClassifierConfig::default(),
            search: SearchConfig::default(),
            health: HealthConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for vitalchat_core::Error {
    fn from(err: ConfigError) -> Self {
        vitalchat_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classifier.max_tokens, 10);
        assert_eq!(config.synthesis.summary_deadline_secs, 180);
        assert!(config.health.records_path.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(
            parsed.synthesis.health_token_budget,
            config.synthesis.health_token_budget
        );
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn combine_budget_cannot_exceed_health_budget() {
        let mut config = AppConfig::default();
        config.synthesis.combine_token_budget = 20_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("combine_token_budget"));
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = AppConfig::default();
        config.synthesis.summary_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_context_size_rejected() {
        let mut config = AppConfig::default();
        config.search.context_size = "huge".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.api_url, "https://api.openai.com/v1");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "gpt-4o-mini"

[health]
records_path = "/data/ehr.json"

[synthesis]
summary_workers = 8
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.health.records_path, Some(PathBuf::from("/data/ehr.json")));
        assert_eq!(config.health.default_window_days, 7);
        assert_eq!(config.synthesis.summary_workers, 8);
        assert_eq!(config.synthesis.health_token_budget, 10_000);
    }

    #[test]
    fn invalid_file_is_rejected_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[synthesis]\nsummary_workers = 0\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));

        std::fs::write(&path, "not = [valid").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn summary_model_falls_back_to_default_model() {
        let mut config = AppConfig::default();
        assert_eq!(config.summary_model(), "gpt-4o");
        config.synthesis.summary_model = Some("gpt-4o-mini".into());
        assert_eq!(config.summary_model(), "gpt-4o-mini");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini-search-preview"));
        assert!(toml_str.contains("[synthesis]"));
    }
}
