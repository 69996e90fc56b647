//! Engine configuration.
//!
//! Every knob the dashboard used to hardcode lives here: guard thresholds,
//! the grouping allow-list, label overrides, the header alias table and the
//! curated metric table. All sections default sensibly, so a JSON override
//! file only needs the keys it changes.
//!
//! ```rust
//! use cohort_guard::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{"guards": {"min_sample_size": 10}}"#).unwrap();
//! assert_eq!(config.guards.min_sample_size, 10);
//! assert_eq!(config.guards.pie_max_categories, 12);
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analyzers::{InferenceConfig, MutexConfig};
use crate::error::{CohortError, ErrorContext, Result};
use crate::guard::GuardConfig;
use crate::metrics::{EligibilityMode, MetricConfig};
use crate::records::derive::DerivationConfig;
use crate::records::HeaderAliases;

const DEFAULT_GROUPING_FIELDS: &[&str] = &[
    "age",
    "age_group",
    "campus_name",
    "nationality",
    "visa_status",
    "study_reason",
    "mode_of_study",
    "previous_offer_intake",
    "previous_offer_year",
    "intake_year",
    "intake_term",
    "startdate",
    "finishdate",
    "upfront_fee_preference",
    "study_english",
];

const DEFAULT_TIME_FIELDS: &[&str] = &["intake_year", "intake_term", "startdate", "finishdate"];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Complete configuration of a [`Dataset`](crate::dataset::Dataset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub guards: GuardConfig,
    pub inference: InferenceConfig,
    pub mutex: MutexConfig,
    pub headers: HeaderAliases,
    pub derivation: DerivationConfig,
    pub metrics: MetricConfig,
    /// Fields offered as grouping candidates besides time-typed ones.
    pub grouping_allow_list: Vec<String>,
    /// Fields treated as time axes even when not date-typed.
    pub time_fields: Vec<String>,
    /// Numeric fields that make poor category axes.
    pub continuous_fields: Vec<String>,
    /// Field key to display label, applied after header labels.
    pub label_overrides: HashMap<String, String>,
    /// Per-field category caps overriding `guards.max_axis_categories`.
    pub axis_caps: HashMap<String, usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            guards: GuardConfig::default(),
            inference: InferenceConfig::default(),
            mutex: MutexConfig::default(),
            headers: HeaderAliases::default(),
            derivation: DerivationConfig::default(),
            metrics: MetricConfig::default(),
            grouping_allow_list: strings(DEFAULT_GROUPING_FIELDS),
            time_fields: strings(DEFAULT_TIME_FIELDS),
            continuous_fields: strings(&["age"]),
            label_overrides: HashMap::from([
                ("study_english".to_string(), "Study English".to_string()),
                (
                    "upfront_fee_preference".to_string(),
                    "Upfront fee (Yes/No)".to_string(),
                ),
            ]),
            axis_caps: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON override document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON override file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .config_context(format!("reading engine config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Rejects values no dataset could satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.guards.pie_max_categories == 0 {
            return Err(CohortError::configuration(
                "guards.pie_max_categories must be at least 1",
            ));
        }
        if self.guards.max_axis_categories == 0 {
            return Err(CohortError::configuration(
                "guards.max_axis_categories must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.mutex.consistency_threshold) {
            return Err(CohortError::configuration(format!(
                "mutex.consistency_threshold must be within 0..=1, got {}",
                self.mutex.consistency_threshold
            )));
        }
        if self.inference.sample_size == 0 {
            return Err(CohortError::configuration(
                "inference.sample_size must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn with_guards(mut self, guards: GuardConfig) -> Self {
        self.guards = guards;
        self
    }

    pub fn with_min_sample_size(mut self, min: usize) -> Self {
        self.guards.min_sample_size = min;
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfig) -> Self {
        self.inference = inference;
        self
    }

    pub fn with_mutex(mut self, mutex: MutexConfig) -> Self {
        self.mutex = mutex;
        self
    }

    pub fn with_headers(mut self, headers: HeaderAliases) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_eligibility(mut self, mode: EligibilityMode) -> Self {
        self.metrics.mode = mode;
        self
    }

    /// Adds a field to the grouping allow-list.
    pub fn with_grouping_field(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !self.grouping_allow_list.contains(&key) {
            self.grouping_allow_list.push(key);
        }
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, label: impl Into<String>) -> Self {
        self.label_overrides.insert(key.into(), label.into());
        self
    }

    pub fn with_axis_cap(mut self, key: impl Into<String>, cap: usize) -> Self {
        self.axis_caps.insert(key.into(), cap);
        self
    }

    /// Category cap for a grouping field.
    pub fn axis_cap(&self, key: &str) -> usize {
        self.axis_caps
            .get(key)
            .copied()
            .unwrap_or(self.guards.max_axis_categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.guards.min_sample_size, 5);
        assert_eq!(config.guards.max_axis_categories, 200);
        assert_eq!(config.mutex.min_pairs, 20);
        assert!(config.grouping_allow_list.contains(&"nationality".to_string()));
        assert_eq!(config.label_overrides["study_english"], "Study English");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json_str(
            r#"{
                "metrics": {"mode": "generic"},
                "axis_caps": {"campus_name": 10},
                "mutex": {"consistency_threshold": 0.9}
            }"#,
        )
        .unwrap();

        assert_eq!(config.metrics.mode, EligibilityMode::Generic);
        assert_eq!(config.axis_cap("campus_name"), 10);
        assert_eq!(config.axis_cap("nationality"), 200);
        assert_eq!(config.mutex.min_pairs, 20);
        assert!(!config.metrics.defaults.is_empty());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = EngineConfig::from_json_str(r#"{"mutex": {"consistency_threshold": 1.5}}"#)
            .unwrap_err();
        assert!(matches!(err, CohortError::Configuration(_)));

        let err = EngineConfig::from_json_str(r#"{"guards": {"pie_max_categories": 0}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("pie_max_categories"));

        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(CohortError::Serialization(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"continuous_fields": ["age", "courseattempt"]}}"#).unwrap();

        let config = EngineConfig::from_path(file.path()).unwrap();
        assert_eq!(config.continuous_fields, vec!["age", "courseattempt"]);

        let missing = EngineConfig::from_path("/nonexistent/cohort.json").unwrap_err();
        assert!(matches!(missing, CohortError::Configuration(_)));
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_min_sample_size(3)
            .with_grouping_field("gender")
            .with_grouping_field("gender")
            .with_label("gender", "Gender")
            .with_axis_cap("gender", 4);

        assert_eq!(config.guards.min_sample_size, 3);
        assert_eq!(
            config
                .grouping_allow_list
                .iter()
                .filter(|k| k.as_str() == "gender")
                .count(),
            1
        );
        assert_eq!(config.axis_cap("gender"), 4);
    }
}
