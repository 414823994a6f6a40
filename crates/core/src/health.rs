//! Personal health data collaborators.
//!
//! Two independent stores feed the health retriever:
//! - [`HealthRecordStore`]: structured records grouped as
//!   `category → subcategory → [record]` (EHR export).
//! - [`MobileMetricsStore`]: daily time series from a phone/watch
//!   (heart rate, blood pressure, HRV, steps), queried by date window.
//!
//! Either may be absent; an absent store is a normal configuration,
//! not an error.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use crate::error::StoreError;

/// `category → [subcategory]`.
pub type CategoryMap = BTreeMap<String, Vec<String>>;

/// `category → subcategory → [record]`.
pub type HealthRecords = BTreeMap<String, BTreeMap<String, Vec<serde_json::Value>>>;

#[async_trait]
pub trait HealthRecordStore: Send + Sync {
    /// Categories and subcategories present in the store.
    async fn available_categories(&self) -> Result<CategoryMap, StoreError>;

    /// Records for the selected subcategories, at most `max_per_subcategory` each.
    async fn query(
        &self,
        selection: &CategoryMap,
        max_per_subcategory: usize,
    ) -> Result<HealthRecords, StoreError>;
}

/// The mobile metric families the assistant understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HeartRate,
    BloodPressure,
    HeartRateVariability,
    Steps,
}

impl MetricKind {
    /// Fixed payload order.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::HeartRate,
        MetricKind::BloodPressure,
        MetricKind::HeartRateVariability,
        MetricKind::Steps,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "Heart Rate",
            MetricKind::BloodPressure => "Blood Pressure",
            MetricKind::HeartRateVariability => "Heart Rate Variability",
            MetricKind::Steps => "Daily Steps",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "bpm",
            MetricKind::BloodPressure => "mmHg",
            MetricKind::HeartRateVariability => "ms",
            MetricKind::Steps => "steps",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One day of aggregated samples.
///
/// Which aggregates are meaningful depends on the metric: heart rate uses
/// avg/min/max, HRV uses avg, steps use sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    #[serde(default)]
    pub avg: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub sum: f64,
    #[serde(default)]
    pub count: usize,
}

/// A single blood pressure measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureReading {
    pub taken_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Stable,
    Increasing,
    Decreasing,
    Improving,
    Declining,
    InsufficientData,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendDirection::Stable => "stable",
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::InsufficientData => "insufficient data",
        };
        f.write_str(s)
    }
}

/// Trend summary computed over a metric's full history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_avg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<TrendDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_recorded: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recorded: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_avg_systolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_avg_diastolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic_direction: Option<TrendDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic_direction: Option<TrendDirection>,
}

/// A date-bounded slice of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWindow {
    pub kind: MetricKind,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Daily aggregates, oldest first (heart rate, HRV, steps).
    #[serde(default)]
    pub daily: Vec<DailyStat>,
    /// Individual readings, newest first (blood pressure).
    #[serde(default)]
    pub readings: Vec<PressureReading>,
    #[serde(default)]
    pub trend: MetricTrend,
}

impl MetricWindow {
    pub fn empty(kind: MetricKind, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            kind,
            start,
            end,
            daily: Vec::new(),
            readings: Vec::new(),
            trend: MetricTrend::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty() && self.readings.is_empty()
    }
}

#[async_trait]
pub trait MobileMetricsStore: Send + Sync {
    /// Samples of `kind` dated within `[start, end]` (inclusive).
    async fn window(
        &self,
        kind: MetricKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MetricWindow, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_kind_serializes_snake_case() {
        let json = serde_json::to_string(&MetricKind::HeartRateVariability).unwrap();
        assert_eq!(json, "\"heart_rate_variability\"");
    }

    #[test]
    fn daily_stat_fills_missing_aggregates() {
        let stat: DailyStat = serde_json::from_str(r#"{"date":"2026-01-10","avg":58.5,"count":12}"#).unwrap();
        assert_eq!(stat.avg, 58.5);
        assert_eq!(stat.sum, 0.0);
        assert_eq!(stat.count, 12);
    }

    #[test]
    fn empty_window_reports_empty() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let w = MetricWindow::empty(MetricKind::Steps, d, d);
        assert!(w.is_empty());
        assert_eq!(w.kind.unit(), "steps");
    }
}
