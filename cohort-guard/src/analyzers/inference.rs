//! Column type inference over a sample of normalized records.
//!
//! Each non-null value in the sample sets one of four flags: looks date,
//! looks boolean, looks numeric, or plain string. The flags are then resolved
//! with a fixed precedence:
//!
//! 1. date, if any date-like value was seen;
//! 2. numeric, if a numeric value was seen and no plain string;
//! 3. boolean, if a boolean token was seen and no plain string;
//! 4. categorical otherwise (including empty and all-null columns).
//!
//! A single unparseable string therefore disqualifies a column from numeric
//! and boolean no matter how many numbers it holds. Identifier-like and
//! year-like keys are always categorical.
//!
//! # Example
//!
//! ```rust
//! use cohort_guard::analyzers::inference::{ColumnType, TypeInferenceEngine};
//! use cohort_guard::records::Record;
//! use serde_json::json;
//!
//! let rows: Vec<Record> = vec![
//!     Record::from(json!({"age": 20, "startdate": "2024-02-19"}).as_object().unwrap().clone()),
//!     Record::from(json!({"age": "24", "startdate": null}).as_object().unwrap().clone()),
//! ];
//!
//! let engine = TypeInferenceEngine::builder().sample_size(50).build();
//! assert_eq!(engine.infer_column(&rows, "age", "Age"), ColumnType::Numeric);
//! assert_eq!(engine.infer_column(&rows, "startdate", "StartDate"), ColumnType::Date);
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::records::{is_blank, Record};

/// Configuration for the type inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Number of leading rows scanned per column (default: 100)
    pub sample_size: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { sample_size: 100 }
    }
}

/// The four column categories the dashboard distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Date,
    Boolean,
    Categorical,
}

impl ColumnType {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnType::Numeric => "numeric",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Categorical => "categorical",
        }
    }
}

/// What kinds of values were seen in a column's sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeHints {
    pub numeric: bool,
    pub date: bool,
    pub boolean: bool,
    pub string: bool,
}

impl TypeHints {
    /// Resolves the hints using the fixed precedence described in the module docs.
    pub fn classify(&self) -> ColumnType {
        if self.date {
            ColumnType::Date
        } else if self.numeric && !self.string {
            ColumnType::Numeric
        } else if self.boolean && !self.string {
            ColumnType::Boolean
        } else {
            ColumnType::Categorical
        }
    }
}

struct TypePatterns {
    date_iso: Regex,
    date_dmy: Regex,
    boolean: Regex,
    year_token: Regex,
}

static PATTERNS: Lazy<TypePatterns> = Lazy::new(|| TypePatterns {
    // Unanchored: a timestamp such as "2024-02-19T09:00" still reads as a date.
    date_iso: Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid regex"),
    date_dmy: Regex::new(r"\d{2}/\d{2}/\d{4}").expect("valid regex"),
    boolean: Regex::new(r"^(yes|no|true|false|y|n|0|1)$").expect("valid regex"),
    year_token: Regex::new(r"(?i)(^|[^a-z])years?([^a-z]|$)").expect("valid regex"),
});

const IDENTIFIER_KEYS: &[&str] = &["studentid", "offerid", "courseid", "coeno"];

/// Whether a key names an identifier column.
pub fn is_identifier_key(key: &str) -> bool {
    let k = key.to_lowercase();
    IDENTIFIER_KEYS.contains(&k.as_str()) || k.ends_with("_id")
}

/// Whether a key (or its label, when present) names a year column.
pub fn is_year_key(key: &str, label: &str) -> bool {
    let subject = if label.is_empty() { key } else { label };
    PATTERNS.year_token.is_match(subject)
}

/// Whether a string value looks like a date.
pub fn looks_like_date(value: &str) -> bool {
    PATTERNS.date_iso.is_match(value) || PATTERNS.date_dmy.is_match(value)
}

/// Builder for [`TypeInferenceEngine`].
pub struct TypeInferenceEngineBuilder {
    config: InferenceConfig,
}

impl TypeInferenceEngineBuilder {
    /// Set the number of rows sampled per column
    pub fn sample_size(mut self, size: usize) -> Self {
        self.config.sample_size = size;
        self
    }

    /// Build the TypeInferenceEngine
    pub fn build(self) -> TypeInferenceEngine {
        TypeInferenceEngine {
            config: self.config,
        }
    }
}

/// Classifies columns from sampled records.
#[derive(Debug, Clone)]
pub struct TypeInferenceEngine {
    config: InferenceConfig,
}

impl TypeInferenceEngine {
    /// Create a new builder for TypeInferenceEngine
    pub fn builder() -> TypeInferenceEngineBuilder {
        TypeInferenceEngineBuilder {
            config: InferenceConfig::default(),
        }
    }

    /// Create a TypeInferenceEngine with the given configuration
    pub fn with_config(config: InferenceConfig) -> Self {
        Self { config }
    }

    /// Create a TypeInferenceEngine with default configuration
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Updates `hints` with a single value.
    pub fn observe(&self, value: &Value, hints: &mut TypeHints) {
        if is_blank(value) {
            return;
        }
        match value {
            Value::Number(_) => hints.numeric = true,
            Value::Bool(_) => hints.boolean = true,
            Value::String(raw) => {
                let token = raw.trim().to_lowercase();
                if looks_like_date(raw) {
                    hints.date = true;
                } else if PATTERNS.boolean.is_match(&token) {
                    hints.boolean = true;
                } else if raw.trim().parse::<f64>().map_or(false, f64::is_finite) {
                    hints.numeric = true;
                } else {
                    hints.string = true;
                }
            }
            _ => hints.string = true,
        }
    }

    /// Scans the sampled rows and collects hints for every key seen.
    pub fn analyze_samples(&self, rows: &[Record]) -> HashMap<String, TypeHints> {
        let mut hints: HashMap<String, TypeHints> = HashMap::new();
        for row in rows.iter().take(self.config.sample_size) {
            for (key, value) in row.iter() {
                let entry = hints.entry(key.to_string()).or_default();
                self.observe(value, entry);
            }
        }
        hints
    }

    /// Final type for a column given its hints, key and display label.
    pub fn determine_type(&self, key: &str, label: &str, hints: Option<&TypeHints>) -> ColumnType {
        if is_identifier_key(key) || is_year_key(key, label) {
            return ColumnType::Categorical;
        }
        hints.map_or(ColumnType::Categorical, TypeHints::classify)
    }

    /// Infers a single column.
    pub fn infer_column(&self, rows: &[Record], key: &str, label: &str) -> ColumnType {
        let mut hints = TypeHints::default();
        for row in rows.iter().take(self.config.sample_size) {
            if let Some(value) = row.get(key) {
                self.observe(value, &mut hints);
            }
        }
        self.determine_type(key, label, Some(&hints))
    }

    /// Infers every key in `keys`, looking labels up in `labels`.
    #[instrument(skip_all, fields(rows = rows.len(), columns = keys.len()))]
    pub fn infer_columns(
        &self,
        rows: &[Record],
        keys: &[String],
        labels: &HashMap<String, String>,
    ) -> Vec<(String, ColumnType)> {
        let hints = self.analyze_samples(rows);
        keys.iter()
            .map(|key| {
                let label = labels.get(key).map(String::as_str).unwrap_or(key);
                let column_type = self.determine_type(key, label, hints.get(key));
                debug!(
                    column = %key,
                    column_type = column_type.type_name(),
                    "Inferred column type"
                );
                (key.clone(), column_type)
            })
            .collect()
    }
}

impl Default for TypeInferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}
