//! Error types for the VitalChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own error enum; the top-level
//! [`Error`] wraps them for callers that don't care which one failed.

use thiserror::Error;

/// The top-level error type for VitalChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Text generation ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Web search ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    // --- Health record / mobile metric stores ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty completion: {0}")]
    EmptyResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Search disabled: {0}")]
    Disabled(String),

    #[error("Search timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed search response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Unsupported metric: {0}")]
    UnsupportedMetric(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
