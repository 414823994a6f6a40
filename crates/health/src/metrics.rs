//! Processed mobile metrics: the on-disk format written by the processor
//! and the store that serves date windows from it.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use vitalchat_core::error::StoreError;
use vitalchat_core::health::{
    DailyStat, MetricKind, MetricTrend, MetricWindow, MobileMetricsStore, PressureReading,
};

/// A metric aggregated per day, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    #[serde(default)]
    pub daily: Vec<DailyStat>,
    #[serde(default)]
    pub trend: MetricTrend,
}

/// Blood pressure readings, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PressureSeries {
    #[serde(default)]
    pub readings: Vec<PressureReading>,
    #[serde(default)]
    pub trend: MetricTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Everything the processor extracts from a HealthKit export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMobileData {
    pub last_updated: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub total_days: usize,
    #[serde(default)]
    pub categories_processed: Vec<String>,
    #[serde(default)]
    pub heart_rate: DailySeries,
    #[serde(default)]
    pub blood_pressure: PressureSeries,
    #[serde(default)]
    pub hrv: DailySeries,
    #[serde(default)]
    pub steps: DailySeries,
}

impl ProcessedMobileData {
    /// Slice one metric to `[start, end]`.
    pub fn window(&self, kind: MetricKind, start: NaiveDate, end: NaiveDate) -> MetricWindow {
        let in_range = |d: NaiveDate| d >= start && d <= end;
        let mut window = MetricWindow::empty(kind, start, end);

        let series = match kind {
            MetricKind::HeartRate => &self.heart_rate,
            MetricKind::HeartRateVariability => &self.hrv,
            MetricKind::Steps => &self.steps,
            MetricKind::BloodPressure => {
                window.readings = self
                    .blood_pressure
                    .readings
                    .iter()
                    .filter(|r| in_range(r.taken_at.date()))
                    .cloned()
                    .collect();
                window.trend = self.blood_pressure.trend.clone();
                return window;
            }
        };

        window.daily = series
            .daily
            .iter()
            .filter(|d| in_range(d.date))
            .cloned()
            .collect();
        window.trend = series.trend.clone();
        window
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let write_err = |reason: String| StoreError::Write {
            path: path.display().to_string(),
            reason,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| write_err(e.to_string()))
    }
}

/// [`MobileMetricsStore`] over a processed metrics file held in memory.
pub struct ProcessedMetricsStore {
    data: ProcessedMobileData,
}

impl ProcessedMetricsStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let data: ProcessedMobileData =
            serde_json::from_str(&content).map_err(|e| StoreError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(
            path = %path.display(),
            total_days = data.total_days,
            "Loaded processed mobile metrics"
        );
        Ok(Self { data })
    }

    pub fn new(data: ProcessedMobileData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &ProcessedMobileData {
        &self.data
    }
}

#[async_trait]
impl MobileMetricsStore for ProcessedMetricsStore {
    async fn window(
        &self,
        kind: MetricKind,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MetricWindow, StoreError> {
        Ok(self.data.window(kind, start, end))
    }
}
