//! The field rule registry.
//!
//! One [`FieldRule`] per column key plus the virtual measures, built once per
//! dataset load and read-only afterwards. Every other component receives the
//! registry by reference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::analyzers::inference::{is_identifier_key, is_year_key};
use crate::analyzers::{ColumnType, TypeInferenceEngine};
use crate::config::EngineConfig;
use crate::log_field;
use crate::logging::{truncate_field, LogConfig};
use crate::metrics::Metric;
use crate::records::{normalize_yes_no, Record};

/// What a field may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    Dimension,
    Measure,
    Filter,
    Time,
}

/// Declared behaviour of one column or virtual measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: ColumnType,
    pub roles: Vec<FieldRole>,
    pub label: String,
    /// Category cap overriding the global one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_axis_cardinality: Option<usize>,
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
    pub is_id: bool,
    pub is_year: bool,
    pub is_continuous: bool,
    /// Date-typed or declared as a time axis; pie charts refuse these.
    pub temporal: bool,
    /// Offered in the grouping-field selector.
    pub x_eligible: bool,
}

impl FieldRule {
    pub fn has_role(&self, role: FieldRole) -> bool {
        self.roles.contains(&role)
    }

    /// Whether the field can partition rows (dimension or time role).
    pub fn is_groupable(&self) -> bool {
        self.has_role(FieldRole::Dimension) || self.has_role(FieldRole::Time)
    }

    fn virtual_measure(metric: &Metric, label: String) -> Self {
        Self {
            key: metric.key(),
            field_type: ColumnType::Numeric,
            roles: vec![FieldRole::Measure],
            label,
            max_axis_cardinality: None,
            is_virtual: true,
            is_id: false,
            is_year: false,
            is_continuous: false,
            temporal: false,
            x_eligible: false,
        }
    }
}

/// Ordered, immutable set of field rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldRegistry {
    rules: Vec<FieldRule>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    /// Builds rules for every key of the first row, preceded by the virtual
    /// measures the configuration declares.
    ///
    /// Columns that first appear after row 0 get no rule.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub fn build(
        rows: &[Record],
        header_labels: &HashMap<String, String>,
        config: &EngineConfig,
        log: &LogConfig,
    ) -> Self {
        let keys: Vec<String> = rows
            .first()
            .map(|row| row.keys().map(str::to_string).collect())
            .unwrap_or_default();

        let labels: HashMap<String, String> = keys
            .iter()
            .map(|key| {
                let label = config
                    .label_overrides
                    .get(key)
                    .or_else(|| header_labels.get(key))
                    .cloned()
                    .unwrap_or_else(|| key.clone());
                (key.clone(), label)
            })
            .collect();

        let engine = TypeInferenceEngine::with_config(config.inference.clone());
        let column_rules: Vec<FieldRule> = engine
            .infer_columns(rows, &keys, &labels)
            .into_iter()
            .map(|(key, field_type)| {
                let label = labels.get(&key).cloned().unwrap_or_else(|| key.clone());
                let rule = column_rule(key, label, field_type, config);
                log_field!(
                    log,
                    field = %rule.key,
                    label = %truncate_field(&rule.label, log.max_field_length),
                    field_type = rule.field_type.type_name(),
                    x_eligible = rule.x_eligible,
                    "Registered field"
                );
                rule
            })
            .collect();

        let mut rules: Vec<FieldRule> = config
            .metrics
            .declared_virtual_metrics()
            .into_iter()
            .filter(|metric| {
                metric
                    .source_field()
                    .map_or(true, |field| keys.iter().any(|k| k == field))
            })
            .map(|metric| {
                let label = config
                    .metrics
                    .labels
                    .get(&metric.key())
                    .cloned()
                    .unwrap_or_else(|| {
                        metric.default_label(|field| {
                            labels.get(field).cloned().unwrap_or_else(|| field.to_string())
                        })
                    });
                FieldRule::virtual_measure(&metric, label)
            })
            .collect();
        let virtual_count = rules.len();
        rules.extend(column_rules);

        let registry = Self::from_rules(rules);
        info!(
            columns = registry.len() - virtual_count,
            virtual_measures = virtual_count,
            "Built field registry"
        );
        registry
    }

    /// Registry over explicit rules. A repeated key keeps its first rule.
    pub fn from_rules(rules: Vec<FieldRule>) -> Self {
        let mut kept = Vec::with_capacity(rules.len());
        let mut index = HashMap::with_capacity(rules.len());
        for rule in rules {
            if !index.contains_key(&rule.key) {
                index.insert(rule.key.clone(), kept.len());
                kept.push(rule);
            }
        }
        Self { rules: kept, index }
    }

    pub fn get(&self, key: &str) -> Option<&FieldRule> {
        self.index.get(key).map(|&i| &self.rules[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Rules in registry order: virtual measures first, then columns.
    pub fn rules(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Keys carrying `role`, in registry order.
    pub fn keys_for_role(&self, role: FieldRole) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.has_role(role))
            .map(|rule| rule.key.as_str())
            .collect()
    }

    /// Labels of the fields carrying `role`, in the order of [`keys_for_role`](Self::keys_for_role).
    pub fn labels_for_role(&self, role: FieldRole) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.has_role(role))
            .map(|rule| rule.label.as_str())
            .collect()
    }

    /// Fields offered as the grouping axis.
    pub fn grouping_candidates(&self) -> Vec<&FieldRule> {
        self.rules
            .iter()
            .filter(|rule| rule.x_eligible && !rule.is_virtual)
            .collect()
    }

    /// Fields offered for equality filters.
    pub fn filter_candidates(&self) -> Vec<&FieldRule> {
        self.rules
            .iter()
            .filter(|rule| !rule.is_virtual && rule.has_role(FieldRole::Filter))
            .collect()
    }

    /// Display label for `key`, or the key itself when unknown.
    pub fn label(&self, key: &str) -> String {
        self.get(key)
            .map_or_else(|| key.to_string(), |rule| rule.label.clone())
    }

    /// Canonical form of a value for the column's type: boolean columns
    /// become `"Yes"`/`"No"`, everything else is returned unchanged.
    pub fn normalize_value(&self, key: &str, value: &Value) -> Value {
        match self.get(key) {
            Some(rule) if rule.field_type == ColumnType::Boolean => normalize_yes_no(value)
                .map_or_else(|| value.clone(), |token| json!(token)),
            _ => value.clone(),
        }
    }

    /// Applies [`normalize_value`](Self::normalize_value) to every column of a record.
    pub fn normalize_record(&self, record: &mut Record) {
        let boolean_keys: Vec<String> = record
            .keys()
            .filter(|key| {
                self.get(key)
                    .map_or(false, |rule| rule.field_type == ColumnType::Boolean)
            })
            .map(str::to_string)
            .collect();
        for key in boolean_keys {
            if let Some(value) = record.get(&key) {
                let normalized = self.normalize_value(&key, value);
                record.insert(key, normalized);
            }
        }
    }
}

fn column_rule(
    key: String,
    label: String,
    field_type: ColumnType,
    config: &EngineConfig,
) -> FieldRule {
    let mut roles = vec![FieldRole::Dimension, FieldRole::Filter];
    if field_type == ColumnType::Date {
        roles.push(FieldRole::Time);
    }
    if field_type == ColumnType::Numeric {
        roles.push(FieldRole::Measure);
    }

    let is_id = is_identifier_key(&key);
    let is_year = is_year_key(&key, &label);
    let has_time = roles.contains(&FieldRole::Time);
    let allowed = config.grouping_allow_list.iter().any(|k| *k == key);
    let x_eligible = !is_id && (allowed || has_time);

    FieldRule {
        is_continuous: field_type == ColumnType::Numeric
            && config.continuous_fields.iter().any(|k| *k == key),
        temporal: has_time || config.time_fields.iter().any(|k| *k == key),
        max_axis_cardinality: config.axis_caps.get(&key).copied(),
        is_virtual: false,
        key,
        field_type,
        roles,
        label,
        is_id,
        is_year,
        x_eligible,
    }
}
