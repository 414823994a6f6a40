//! # VitalChat Core
//!
//! Domain types, traits, and error definitions for the VitalChat health
//! assistant. This crate has **no framework dependencies**; it defines the
//! domain model that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod search;
pub mod health;
pub mod status;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result, ProviderError, SearchError, StoreError};
pub use message::{Message, Role, Conversation, ConversationId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use search::{SearchCapability, SearchResponse};
pub use health::{
    CategoryMap, DailyStat, HealthRecordStore, HealthRecords, MetricKind, MetricTrend,
    MetricWindow, MobileMetricsStore, PressureReading, TrendDirection,
};
pub use status::{ProgressStage, StatusGuard, StatusRegister};
