//! Personal health source: EHR records plus windowed mobile metrics.
//!
//! The source is consulted when the health classifier says so or when the
//! keyword detector finds a metric question. Having no stores at all is an
//! ordinary setup (a plain chatbot) and is reported as `Unneeded` quietly.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, trace, warn};
use vitalchat_core::error::StoreError;
use vitalchat_core::health::{CategoryMap, HealthRecordStore, MobileMetricsStore};
use vitalchat_core::status::{ProgressStage, StatusRegister};
use vitalchat_health::{HealthPayload, MetricDetector, MetricQuery, metric_section, record_sections};

use super::SourceResult;
use crate::classifier::{Relevance, RelevanceClassifier};
use crate::error::SynthesisError;

/// What the health source produced for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthFetch {
    pub payload: HealthPayload,
    /// Record categories that were extracted.
    pub categories: CategoryMap,
    /// Metric window that was applied, if any.
    pub window: Option<(NaiveDate, NaiveDate)>,
}

#[derive(Clone)]
pub struct HealthRetriever {
    classifier: Arc<RelevanceClassifier>,
    records: Option<Arc<dyn HealthRecordStore>>,
    mobile: Option<Arc<dyn MobileMetricsStore>>,
    detector: MetricDetector,
    max_records: usize,
    reference_date: Option<NaiveDate>,
}

impl HealthRetriever {
    pub fn new(classifier: Arc<RelevanceClassifier>) -> Self {
        Self {
            classifier,
            records: None,
            mobile: None,
            detector: MetricDetector::default(),
            max_records: 25,
            reference_date: None,
        }
    }

    pub fn with_records(mut self, store: Arc<dyn HealthRecordStore>) -> Self {
        self.records = Some(store);
        self
    }

    pub fn with_mobile(mut self, store: Arc<dyn MobileMetricsStore>) -> Self {
        self.mobile = Some(store);
        self
    }

    pub fn with_detector(mut self, detector: MetricDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    /// Anchor metric windows at `date` instead of today.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn has_stores(&self) -> bool {
        self.records.is_some() || self.mobile.is_some()
    }

    pub async fn retrieve(&self, query: &str, status: &StatusRegister) -> SourceResult<HealthFetch> {
        if !self.has_stores() {
            trace!("No health stores configured");
            return SourceResult::Unneeded;
        }

        let metrics = self.detector.detect(query);
        let wants_records = match &self.records {
            Some(_) => self.classifier.classify(query, Relevance::Health).await,
            None => false,
        };
        if !wants_records && metrics.is_none() {
            debug!("Personal health data not needed");
            return SourceResult::Unneeded;
        }

        status.set(ProgressStage::RetrievingHealthData);
        let fetched = match self.gather(query, wants_records, metrics.as_ref()).await {
            Ok(fetched) => fetched,
            Err(e) => {
                let err = SynthesisError::from(e);
                warn!(error = %err, "Health retrieval failed");
                return SourceResult::Failed(err);
            }
        };
        status.set(ProgressStage::AnalyzingHealthData);

        if fetched.payload.is_empty() {
            debug!("No matching health data");
            return SourceResult::Unneeded;
        }
        debug!(
            sections = fetched.payload.sections.len(),
            categories = fetched.categories.len(),
            "Health data formatted"
        );
        SourceResult::Fetched(fetched)
    }

    async fn gather(
        &self,
        query: &str,
        wants_records: bool,
        metrics: Option<&MetricQuery>,
    ) -> Result<HealthFetch, StoreError> {
        let mut fetched = HealthFetch {
            payload: HealthPayload::default(),
            categories: CategoryMap::new(),
            window: None,
        };

        if let (true, Some(store)) = (wants_records, &self.records) {
            let available = store.available_categories().await?;
            let selection = self.classifier.select_categories(query, &available).await;
            if !selection.is_empty() {
                let records = store.query(&selection, self.max_records).await?;
                for section in record_sections(&records) {
                    fetched.payload.push(section);
                }
                fetched.categories = selection;
            }
        }

        if let (Some(metrics), Some(store)) = (metrics, &self.mobile) {
            let reference = self
                .reference_date
                .unwrap_or_else(|| Local::now().date_naive());
            let (start, end) = metrics.date_range(reference);
            for kind in &metrics.kinds {
                let window = store.window(*kind, start, end).await?;
                fetched.payload.push(metric_section(&window, metrics.wants_trends));
            }
            fetched.window = Some((start, end));
        }

        Ok(fetched)
    }
}
