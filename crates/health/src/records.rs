//! Structured health-record store backed by an EHR JSON export.
//!
//! The export is one JSON object: each top-level key is a category holding
//! `subcategory → record | [record]`, and `metadata.summary.categories`
//! names the categories actually present.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;
use vitalchat_core::error::StoreError;
use vitalchat_core::health::{CategoryMap, HealthRecordStore, HealthRecords};

pub struct JsonRecordStore {
    source: String,
    data: Map<String, Value>,
}

impl JsonRecordStore {
    /// Load an export from disk.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Read {
                path: source.clone(),
                reason: e.to_string(),
            })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| StoreError::Parse {
            path: source.clone(),
            reason: e.to_string(),
        })?;
        Self::from_value(source, value)
    }

    /// Wrap an already-parsed export. `source` is used in error messages.
    pub fn from_value(source: impl Into<String>, value: Value) -> Result<Self, StoreError> {
        let source = source.into();
        match value {
            Value::Object(data) => {
                debug!(source = %source, categories = data.len(), "Loaded health records");
                Ok(Self { source, data })
            }
            other => Err(StoreError::Parse {
                path: source,
                reason: format!("expected a JSON object, found {}", type_name(&other)),
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn summary_categories(&self) -> Option<Vec<&str>> {
        self.data
            .get("metadata")?
            .get("summary")?
            .get("categories")?
            .as_array()
            .map(|list| list.iter().filter_map(Value::as_str).collect())
    }
}

#[async_trait]
impl HealthRecordStore for JsonRecordStore {
    async fn available_categories(&self) -> Result<CategoryMap, StoreError> {
        let names: Vec<&str> = match self.summary_categories() {
            Some(names) => names,
            None => self
                .data
                .keys()
                .filter(|k| k.as_str() != "metadata")
                .map(String::as_str)
                .collect(),
        };

        let mut categories = CategoryMap::new();
        for name in names {
            if let Some(Value::Object(subs)) = self.data.get(name) {
                categories.insert(name.to_string(), subs.keys().cloned().collect());
            }
        }
        Ok(categories)
    }

    async fn query(
        &self,
        selection: &CategoryMap,
        max_per_subcategory: usize,
    ) -> Result<HealthRecords, StoreError> {
        let mut out = HealthRecords::new();

        for (category, subcategories) in selection {
            let Some(Value::Object(subs)) = self.data.get(category) else {
                continue;
            };

            let mut found = std::collections::BTreeMap::new();
            for sub in subcategories {
                let records = match subs.get(sub) {
                    Some(Value::Array(items)) => {
                        items.iter().take(max_per_subcategory).cloned().collect()
                    }
                    Some(single) => vec![single.clone()],
                    None => continue,
                };
                found.insert(sub.clone(), records);
            }

            if !found.is_empty() {
                out.insert(category.clone(), found);
            }
        }

        Ok(out)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
