//! Keyword detector for mobile-metric questions.
//!
//! Runs without any model call: the query is matched against fixed metric
//! vocabularies on word boundaries, and a look-back window is resolved from
//! time phrases ("this week", "last 10 days", ...). Condition names such as
//! "hypertension" are deliberately absent from the vocabulary; a question
//! about a condition is not a question about the user's readings.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex_lite::Regex;
use vitalchat_core::health::MetricKind;

const HEART_RATE_TERMS: &[&str] = &[
    "heart rate",
    "heartrate",
    "hr",
    "bpm",
    "pulse",
    "heartbeat",
    "beats per minute",
    "resting heart rate",
    "heart rhythm",
    "cardiac rate",
];

const BLOOD_PRESSURE_TERMS: &[&str] = &[
    "blood pressure",
    "bp",
    "systolic",
    "diastolic",
    "pressure reading",
    "mmhg",
];

const HRV_TERMS: &[&str] = &[
    "heart rate variability",
    "hrv",
    "variability",
    "heart variability",
    "cardiac variability",
];

const ACTIVITY_TERMS: &[&str] = &[
    "steps",
    "walking",
    "activity",
    "exercise",
    "movement",
    "physical activity",
    "daily steps",
    "step count",
];

const TREND_TERMS: &[&str] = &[
    "trend",
    "trending",
    "change",
    "changes",
    "changing",
    "improve",
    "improving",
    "improvement",
    "worse",
    "worsening",
    "better",
    "declining",
    "increasing",
    "decreasing",
    "stable",
    "pattern",
    "patterns",
];

/// Fixed phrases and the number of days they look back.
const TIME_PHRASES: &[(&str, u32)] = &[
    ("today", 0),
    ("yesterday", 1),
    ("this week", 7),
    ("last week", 14),
    ("past week", 7),
    ("recent", 7),
    ("recently", 7),
    ("last month", 30),
    ("this month", 30),
];

fn word_set(terms: &[&str]) -> Regex {
    let alternatives: Vec<String> = terms
        .iter()
        .map(|t| t.split(' ').map(regex_lite::escape).collect::<Vec<_>>().join(r"\s+"))
        .collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
        .expect("keyword pattern is valid")
}

static HEART_RATE: LazyLock<Regex> = LazyLock::new(|| word_set(HEART_RATE_TERMS));
static BLOOD_PRESSURE: LazyLock<Regex> = LazyLock::new(|| word_set(BLOOD_PRESSURE_TERMS));
static HRV: LazyLock<Regex> = LazyLock::new(|| word_set(HRV_TERMS));
static ACTIVITY: LazyLock<Regex> = LazyLock::new(|| word_set(ACTIVITY_TERMS));
static TREND: LazyLock<Regex> = LazyLock::new(|| word_set(TREND_TERMS));
/// Longest window a query can ask for (about ten years).
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

static LAST_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:last|past)\s+(\d+)\s+days?\b").expect("valid pattern"));
static LAST_WEEKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:last|past)\s+(\d+)\s+weeks?\b").expect("valid pattern"));

/// What a query asks of the mobile metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    /// Matched metric families, in payload order.
    pub kinds: Vec<MetricKind>,
    /// Days to look back from the reference date.
    pub lookback_days: u32,
    /// Whether the query named the window explicitly.
    pub explicit_window: bool,
    /// Whether trend lines should be included.
    pub wants_trends: bool,
}

impl MetricQuery {
    /// Inclusive `[start, end]` ending at `reference`.
    pub fn date_range(&self, reference: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = reference
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        (start, reference)
    }
}

/// Matches metric vocabulary and resolves the look-back window.
#[derive(Debug, Clone)]
pub struct MetricDetector {
    default_window_days: u32,
}

impl MetricDetector {
    pub fn new(default_window_days: u32) -> Self {
        Self {
            default_window_days,
        }
    }

    /// `None` when the query mentions no metric at all.
    pub fn detect(&self, query: &str) -> Option<MetricQuery> {
        let kinds: Vec<MetricKind> = MetricKind::ALL
            .into_iter()
            .filter(|kind| vocabulary(*kind).is_match(query))
            .collect();
        if kinds.is_empty() {
            return None;
        }

        let explicit = time_window(query);
        Some(MetricQuery {
            kinds,
            lookback_days: explicit.unwrap_or(self.default_window_days),
            explicit_window: explicit.is_some(),
            wants_trends: TREND.is_match(query),
        })
    }
}

impl Default for MetricDetector {
    fn default() -> Self {
        Self::new(7)
    }
}

fn vocabulary(kind: MetricKind) -> &'static Regex {
    match kind {
        MetricKind::HeartRate => &HEART_RATE,
        MetricKind::BloodPressure => &BLOOD_PRESSURE,
        MetricKind::HeartRateVariability => &HRV,
        MetricKind::Steps => &ACTIVITY,
    }
}

/// Look-back days named by the query, if any. Capped at [`MAX_LOOKBACK_DAYS`].
pub fn time_window(query: &str) -> Option<u32> {
    if let Some(n) = capture_number(&LAST_DAYS, query) {
        return Some(n.min(MAX_LOOKBACK_DAYS));
    }
    if let Some(n) = capture_number(&LAST_WEEKS, query) {
        return Some(n.saturating_mul(7).min(MAX_LOOKBACK_DAYS));
    }

    let lower = query.to_lowercase();
    TIME_PHRASES
        .iter()
        .find(|(phrase, _)| contains_phrase(&lower, phrase))
        .map(|&(_, days)| days)
}

fn capture_number(re: &Regex, query: &str) -> Option<u32> {
    // Digits only, so a failed parse means the count overflowed
    let digits = re.captures(query)?.get(1)?.as_str();
    Some(digits.parse().unwrap_or(u32::MAX))
}

/// `phrase` occurs in `haystack` bounded by non-alphanumerics.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(i, _)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
