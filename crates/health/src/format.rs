//! Rendering health data into prompt text.
//!
//! A [`HealthPayload`] is an ordered list of [`HealthSection`]s, one per
//! record category or metric family. Each section keeps its label and the
//! names of the items it holds so that downstream summarization can tag
//! chunks by category and fall back to a categorized listing.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vitalchat_core::health::{HealthRecords, MetricKind, MetricWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSection {
    /// Human label, e.g. "Medications" or "Heart Rate".
    pub category: String,
    /// What the section contains (subcategory names, metric summary).
    pub items: Vec<String>,
    pub text: String,
}

/// Where a section starts in the rendered payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpan {
    pub category: String,
    pub items: Vec<String>,
    /// Byte offset of the section's first character.
    pub start: usize,
}

const SECTION_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthPayload {
    pub sections: Vec<HealthSection>,
}

impl HealthPayload {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn push(&mut self, section: HealthSection) {
        self.sections.push(section);
    }

    /// The full payload text and the start offset of every section.
    pub fn render(&self) -> (String, Vec<SectionSpan>) {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(self.sections.len());
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                text.push_str(SECTION_SEPARATOR);
            }
            spans.push(SectionSpan {
                category: section.category.clone(),
                items: section.items.clone(),
                start: text.len(),
            });
            text.push_str(&section.text);
        }
        (text, spans)
    }

    /// `- <category>: <items>` per section, used when no summary could be made.
    pub fn categorized_listing(&self) -> String {
        self.sections
            .iter()
            .map(|s| {
                if s.items.is_empty() {
                    format!("- {}", s.category)
                } else {
                    format!("- {}: {}", s.category, s.items.join(", "))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn category_label(category: &str) -> String {
    category
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Object(fields) => format!("{{{} fields}}", fields.len()),
        other => other.to_string(),
    }
}

/// One section per record category.
pub fn record_sections(records: &HealthRecords) -> Vec<HealthSection> {
    records
        .iter()
        .map(|(category, subcategories)| {
            let label = category_label(category);
            let mut text = format!("CATEGORY: {}\n", label.to_uppercase());

            for (sub, entries) in subcategories {
                let _ = writeln!(text, "  {sub}:");
                if entries.is_empty() {
                    text.push_str("    No data available\n");
                }
                for (n, record) in entries.iter().enumerate() {
                    let _ = writeln!(text, "    Record {}:", n + 1);
                    match record {
                        Value::Object(fields) => {
                            for (key, value) in fields {
                                let _ = writeln!(text, "      {key}: {}", scalar(value));
                            }
                        }
                        other => {
                            let _ = writeln!(text, "      {}", scalar(other));
                        }
                    }
                }
            }

            HealthSection {
                category: label,
                items: subcategories.keys().cloned().collect(),
                text: text.trim_end().to_string(),
            }
        })
        .collect()
}

/// One section for a mobile metric window.
pub fn metric_section(window: &MetricWindow, include_trends: bool) -> HealthSection {
    let text = match window.kind {
        MetricKind::HeartRate => heart_rate_text(window, include_trends),
        MetricKind::BloodPressure => blood_pressure_text(window, include_trends),
        MetricKind::HeartRateVariability => hrv_text(window, include_trends),
        MetricKind::Steps => steps_text(window),
    };

    let count = if window.kind == MetricKind::BloodPressure {
        format!("{} readings", window.readings.len())
    } else {
        format!("{} days", window.daily.len())
    };

    HealthSection {
        category: window.kind.label().to_string(),
        items: vec![format!("{count} from {} to {}", window.start, window.end)],
        text,
    }
}

fn heading(title: &str, window: &MetricWindow) -> String {
    format!("{title} ({} to {}):", window.start, window.end)
}

fn no_data(title: &str, window: &MetricWindow) -> String {
    format!(
        "{}\n  No data available for the requested period.",
        heading(title, window)
    )
}

fn recent_avg(window: &MetricWindow) -> f64 {
    let recent: Vec<f64> = last_days(window).iter().map(|d| d.avg).collect();
    recent.iter().sum::<f64>() / recent.len() as f64
}

fn last_days(window: &MetricWindow) -> &[vitalchat_core::health::DailyStat] {
    &window.daily[window.daily.len().saturating_sub(7)..]
}

fn heart_rate_text(window: &MetricWindow, include_trends: bool) -> String {
    const TITLE: &str = "HEART RATE DATA";
    if window.daily.is_empty() {
        return no_data(TITLE, window);
    }

    let mut out = vec![heading(TITLE, window)];
    out.push(format!("  Recent 7-day average: {:.1} bpm", recent_avg(window)));

    if include_trends {
        let t = &window.trend;
        if let Some(avg) = t.recent_avg {
            out.push(format!("  Overall average: {avg:.1} bpm"));
        }
        if let Some(dir) = t.direction {
            out.push(format!("  Trend: {dir}"));
        }
        if let (Some(lo), Some(hi)) = (t.min_recorded, t.max_recorded) {
            out.push(format!("  Range: {lo:.0}-{hi:.0} bpm"));
        }
    }

    out.push(String::new());
    out.push("  Daily breakdown:".into());
    for d in last_days(window) {
        out.push(format!(
            "    {}: avg {:.1} bpm (range: {:.0}-{:.0})",
            d.date, d.avg, d.min, d.max
        ));
    }
    out.join("\n")
}

fn blood_pressure_text(window: &MetricWindow, include_trends: bool) -> String {
    const TITLE: &str = "BLOOD PRESSURE DATA";
    if window.readings.is_empty() {
        return no_data(TITLE, window);
    }

    let mut out = vec![heading(TITLE, window)];
    let sys: Vec<f64> = window.readings.iter().filter_map(|r| r.systolic).collect();
    let dia: Vec<f64> = window.readings.iter().filter_map(|r| r.diastolic).collect();
    if !sys.is_empty() {
        out.push(format!(
            "  Average systolic: {:.1} mmHg",
            sys.iter().sum::<f64>() / sys.len() as f64
        ));
    }
    if !dia.is_empty() {
        out.push(format!(
            "  Average diastolic: {:.1} mmHg",
            dia.iter().sum::<f64>() / dia.len() as f64
        ));
    }

    if include_trends {
        if let Some(dir) = window.trend.systolic_direction {
            out.push(format!("  Systolic trend: {dir}"));
        }
        if let Some(dir) = window.trend.diastolic_direction {
            out.push(format!("  Diastolic trend: {dir}"));
        }
    }

    let reading = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| format!("{v:.0}"));
    out.push(String::new());
    out.push("  Recent readings:".into());
    for r in window.readings.iter().take(5) {
        out.push(format!(
            "    {}: {}/{} mmHg",
            r.taken_at.date(),
            reading(r.systolic),
            reading(r.diastolic)
        ));
    }
    out.join("\n")
}

fn hrv_text(window: &MetricWindow, include_trends: bool) -> String {
    const TITLE: &str = "HEART RATE VARIABILITY (HRV) DATA";
    if window.daily.is_empty() {
        return no_data(TITLE, window);
    }

    let mut out = vec![heading(TITLE, window)];
    out.push(format!("  Recent 7-day average: {:.1} ms", recent_avg(window)));

    if include_trends {
        if let Some(avg) = window.trend.recent_avg {
            out.push(format!("  Overall average: {avg:.1} ms"));
        }
        if let Some(dir) = window.trend.direction {
            out.push(format!("  Trend: {dir}"));
            out.push(
                "  Note: Higher HRV generally indicates better cardiovascular fitness and recovery"
                    .into(),
            );
        }
    }

    out.push(String::new());
    out.push("  Daily breakdown:".into());
    for d in last_days(window) {
        out.push(format!("    {}: {:.1} ms", d.date, d.avg));
    }
    out.join("\n")
}

fn steps_text(window: &MetricWindow) -> String {
    const TITLE: &str = "ACTIVITY DATA (Daily Steps)";
    if window.daily.is_empty() {
        return no_data(TITLE, window);
    }

    let counts: Vec<f64> = window.daily.iter().map(|d| d.sum).collect();
    let avg = counts.iter().sum::<f64>() / counts.len() as f64;
    let high = counts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = counts.iter().copied().fold(f64::INFINITY, f64::min);

    let mut out = vec![
        heading(TITLE, window),
        format!("  Average daily steps: {avg:.0}"),
        format!("  Highest: {high:.0} steps"),
        format!("  Lowest: {low:.0} steps"),
        String::new(),
        "  Daily breakdown:".into(),
    ];
    for d in last_days(window) {
        out.push(format!("    {}: {:.0} steps", d.date, d.sum));
    }
    out.join("\n")
}
