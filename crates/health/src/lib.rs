//! VitalChat Health - personal data sources for synthesis.
//!
//! - [`JsonRecordStore`]: EHR export served through [`HealthRecordStore`](vitalchat_core::HealthRecordStore)
//! - [`ProcessedMetricsStore`]: processed HealthKit metrics served by date window
//! - [`process_directory`]: turns raw HealthKit JSONL exports into [`ProcessedMobileData`]
//! - [`MetricDetector`]: keyword detection of metric questions and their time windows
//! - [`HealthPayload`]: prompt-ready rendering of everything retrieved

pub mod detector;
pub mod format;
pub mod metrics;
pub mod processor;
pub mod records;

pub use detector::{MAX_LOOKBACK_DAYS, MetricDetector, MetricQuery, time_window};
pub use format::{HealthPayload, HealthSection, SectionSpan, metric_section, record_sections};
pub use metrics::{DailySeries, DateRange, PressureSeries, ProcessedMetricsStore, ProcessedMobileData};
pub use processor::process_directory;
pub use records::JsonRecordStore;
