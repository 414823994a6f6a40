//! HealthKit export processing.
//!
//! Turns a directory of raw HealthKit JSON-Lines exports into a
//! [`ProcessedMobileData`]: per-day aggregates, joined blood pressure
//! readings and trend summaries. Runs offline (`vitalchat process-mobile`),
//! never on the request path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, info, warn};
use vitalchat_core::error::StoreError;
use vitalchat_core::health::{DailyStat, MetricTrend, PressureReading, TrendDirection};

use crate::metrics::{DailySeries, DateRange, PressureSeries, ProcessedMobileData};

/// Raw file prefixes, keyed by the category name reported in the output.
const FILE_PREFIXES: [(&str, &str); 5] = [
    ("heart_rate", "HealthKitV2Samples_HeartRate_"),
    ("hrv", "HealthKitV2Samples_HeartRateVariability_"),
    ("blood_pressure_systolic", "HealthKitV2Samples_BloodPressureSystolic_"),
    ("blood_pressure_diastolic", "HealthKitV2Samples_BloodPressureDiastolic_"),
    ("daily_steps", "HealthKitV2Statistics_DailySteps_"),
];

const MAX_PRESSURE_READINGS: usize = 100;

/// Process every recognised export under `dir`, shifting all timestamps by
/// `offset_days`.
pub fn process_directory(dir: &Path, offset_days: i64) -> Result<ProcessedMobileData, StoreError> {
    let raw = load_raw(dir)?;
    if raw.is_empty() {
        warn!(dir = %dir.display(), "No HealthKit exports found");
    }
    if offset_days != 0 {
        info!(offset_days, "Shifting sample dates");
    }

    let samples = |name: &str| raw.get(name).map(Vec::as_slice).unwrap_or_default();

    let hr_daily = daily_stats(samples("heart_rate"), offset_days, |v| v > 0.0);
    let heart_rate = DailySeries {
        trend: daily_trend(
            &hr_daily,
            2.0,
            (TrendDirection::Increasing, TrendDirection::Decreasing),
            true,
        ),
        daily: hr_daily,
    };

    let hrv_daily = daily_stats(samples("hrv"), offset_days, |v| v > 0.0);
    let hrv = DailySeries {
        trend: daily_trend(
            &hrv_daily,
            5.0,
            (TrendDirection::Improving, TrendDirection::Declining),
            false,
        ),
        daily: hrv_daily,
    };

    let steps = DailySeries {
        daily: daily_stats(samples("daily_steps"), offset_days, |v| v >= 0.0),
        trend: MetricTrend::default(),
    };

    let readings = join_pressure(
        samples("blood_pressure_systolic"),
        samples("blood_pressure_diastolic"),
        offset_days,
    );
    let blood_pressure = PressureSeries {
        trend: pressure_trend(&readings),
        readings: readings.into_iter().take(MAX_PRESSURE_READINGS).collect(),
    };

    let dates: BTreeSet<NaiveDate> = heart_rate
        .daily
        .iter()
        .chain(&hrv.daily)
        .chain(&steps.daily)
        .map(|d| d.date)
        .chain(blood_pressure.readings.iter().map(|r| r.taken_at.date()))
        .collect();

    let date_range = match (dates.first(), dates.last()) {
        (Some(&start), Some(&end)) => Some(DateRange { start, end }),
        _ => None,
    };

    let processed = ProcessedMobileData {
        last_updated: chrono::Local::now().naive_local(),
        date_range,
        total_days: dates.len(),
        categories_processed: raw.keys().cloned().collect(),
        heart_rate,
        blood_pressure,
        hrv,
        steps,
    };

    info!(
        total_days = processed.total_days,
        heart_rate_days = processed.heart_rate.daily.len(),
        pressure_readings = processed.blood_pressure.readings.len(),
        "Processed mobile data"
    );
    Ok(processed)
}

/// Load every non-deleted export, grouped by category.
fn load_raw(dir: &Path) -> Result<BTreeMap<String, Vec<Value>>, StoreError> {
    let entries = std::fs::read_dir(dir).map_err(|e| StoreError::Read {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut raw: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (category, prefix) in FILE_PREFIXES {
        for file in &files {
            let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(prefix) || name.contains("_Deleted_") {
                continue;
            }
            let records = load_jsonl(file);
            debug!(file = name, records = records.len(), "Loaded export");
            if !records.is_empty() {
                raw.entry(category.to_string()).or_default().extend(records);
            }
        }
    }
    Ok(raw)
}

/// One JSON object per line; blank and malformed lines are skipped.
fn load_jsonl(path: &Path) -> Vec<Value> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable export");
            Vec::new()
        }
    }
}

/// Parse a HealthKit timestamp as local wall-clock time (the UTC offset is
/// dropped, not applied), then shift by `offset_days`.
pub fn parse_timestamp(s: &str, offset_days: i64) -> Option<NaiveDateTime> {
    let s = s.trim();
    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z").ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(parsed + Duration::days(offset_days))
}

fn sample_time(record: &Value, offset_days: i64) -> Option<NaiveDateTime> {
    let raw = record
        .get("Date")
        .or_else(|| record.get("StartDate"))
        .and_then(Value::as_str)?;
    parse_timestamp(raw, offset_days)
}

fn sample_value(record: &Value) -> Option<f64> {
    match record.get("Value")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Per-day aggregates of the values that pass `keep`, oldest first.
fn daily_stats(records: &[Value], offset_days: i64, keep: impl Fn(f64) -> bool) -> Vec<DailyStat> {
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for record in records {
        let (Some(at), Some(value)) = (sample_time(record, offset_days), sample_value(record)) else {
            continue;
        };
        if keep(value) {
            by_day.entry(at.date()).or_default().push(value);
        }
    }

    by_day
        .into_iter()
        .map(|(date, values)| DailyStat {
            date,
            avg: round1(mean(&values)),
            min: round1(values.iter().copied().fold(f64::INFINITY, f64::min)),
            max: round1(values.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            sum: round1(values.iter().sum()),
            count: values.len(),
        })
        .collect()
}

/// Join systolic and diastolic samples on identical timestamps, newest first.
fn join_pressure(systolic: &[Value], diastolic: &[Value], offset_days: i64) -> Vec<PressureReading> {
    let mut by_time: BTreeMap<NaiveDateTime, PressureReading> = BTreeMap::new();

    for (records, is_systolic) in [(systolic, true), (diastolic, false)] {
        for record in records {
            let (Some(at), Some(value)) = (sample_time(record, offset_days), sample_value(record))
            else {
                continue;
            };
            if value <= 0.0 {
                continue;
            }
            let reading = by_time.entry(at).or_insert(PressureReading {
                taken_at: at,
                systolic: None,
                diastolic: None,
            });
            if is_systolic {
                reading.systolic = Some(value);
            } else {
                reading.diastolic = Some(value);
            }
        }
    }

    by_time.into_values().rev().collect()
}

fn direction(diff: f64, threshold: f64, (up, down): (TrendDirection, TrendDirection)) -> TrendDirection {
    if diff.abs() < threshold {
        TrendDirection::Stable
    } else if diff > 0.0 {
        up
    } else {
        down
    }
}

/// Recent 7-day average plus the direction of the last 7 days against the
/// 7 before them. Fewer than 2 days is `insufficient_data`.
fn daily_trend(
    daily: &[DailyStat],
    threshold: f64,
    labels: (TrendDirection, TrendDirection),
    with_range: bool,
) -> MetricTrend {
    if daily.len() < 2 {
        return MetricTrend {
            direction: Some(TrendDirection::InsufficientData),
            ..MetricTrend::default()
        };
    }

    let avgs: Vec<f64> = daily.iter().map(|d| d.avg).collect();
    let n = avgs.len();
    let recent = &avgs[n.saturating_sub(7)..];

    let dir = if n >= 14 {
        direction(mean(recent) - mean(&avgs[n - 14..n - 7]), threshold, labels)
    } else {
        TrendDirection::Stable
    };

    let mut trend = MetricTrend {
        recent_avg: Some(round1(mean(recent))),
        direction: Some(dir),
        ..MetricTrend::default()
    };
    if with_range {
        trend.min_recorded = daily.iter().map(|d| d.min).reduce(f64::min);
        trend.max_recorded = daily.iter().map(|d| d.max).reduce(f64::max);
    }
    trend
}

/// Trend over the newest 7 readings against the next 7, per component.
fn pressure_trend(readings: &[PressureReading]) -> MetricTrend {
    if readings.len() < 2 {
        return MetricTrend {
            direction: Some(TrendDirection::InsufficientData),
            ..MetricTrend::default()
        };
    }

    let component = |values: Vec<f64>, threshold: f64| -> (Option<f64>, Option<TrendDirection>) {
        if values.is_empty() {
            return (None, None);
        }
        let recent = round1(mean(&values[..values.len().min(7)]));
        let dir = if values.len() >= 14 {
            direction(
                recent - mean(&values[7..14]),
                threshold,
                (TrendDirection::Increasing, TrendDirection::Decreasing),
            )
        } else {
            TrendDirection::Stable
        };
        (Some(recent), Some(dir))
    };

    let (recent_avg_systolic, systolic_direction) =
        component(readings.iter().filter_map(|r| r.systolic).collect(), 5.0);
    let (recent_avg_diastolic, diastolic_direction) =
        component(readings.iter().filter_map(|r| r.diastolic).collect(), 3.0);

    MetricTrend {
        recent_avg_systolic,
        recent_avg_diastolic,
        systolic_direction,
        diastolic_direction,
        ..MetricTrend::default()
    }
}
