//! Metrics and the rules deciding which metrics apply to which grouping field.
//!
//! A [`Metric`] is parsed once from its wire key (`"__count__"`,
//! `"__avg__age__"`, a plain column name, ...) and matched exhaustively by the
//! aggregation engine afterwards.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analyzers::ColumnType;
use crate::registry::{FieldRegistry, FieldRole};

const COUNT_KEY: &str = "__count__";
const PERCENT_KEY: &str = "__pct_of_total__";
const YES: &str = "Yes";

static AVG_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^__avg__(.+)__$").expect("valid regex"));
static LEGACY_AVG_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__avg_([a-z0-9]+)__$").expect("valid regex"));
static COUNT_YES_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__count_yes__(.+)__$").expect("valid regex"));
static COUNT_WHERE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__count_where__(.+?)__(.+)__$").expect("valid regex"));

/// The value plotted per group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    /// Number of rows in the group.
    Count,
    /// Group size as a percentage of all grouped rows.
    PercentOfTotal,
    /// Mean of the parseable numeric values of a column. Null, blank and
    /// unparseable values are skipped, not counted as zero.
    Average(String),
    /// Rows whose column equals `value` exactly.
    CountWhereEquals { field: String, value: String },
    /// Sum of a declared numeric column, unparseable values counting as zero.
    Sum(String),
}

impl Metric {
    /// Parses a metric key. Any key that is not one of the reserved forms
    /// names a column to sum.
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        if key == COUNT_KEY {
            return Some(Metric::Count);
        }
        if key == PERCENT_KEY {
            return Some(Metric::PercentOfTotal);
        }
        if let Some(caps) = COUNT_YES_KEY.captures(key) {
            return Some(Metric::count_yes(&caps[1]));
        }
        if let Some(caps) = COUNT_WHERE_KEY.captures(key) {
            return Some(Metric::CountWhereEquals {
                field: caps[1].to_string(),
                value: caps[2].to_string(),
            });
        }
        if let Some(caps) = AVG_KEY.captures(key) {
            return Some(Metric::Average(caps[1].to_string()));
        }
        if let Some(caps) = LEGACY_AVG_KEY.captures(key) {
            return Some(Metric::Average(caps[1].to_string()));
        }
        Some(Metric::Sum(key.to_string()))
    }

    /// Average of `field`.
    pub fn average(field: impl Into<String>) -> Self {
        Metric::Average(field.into())
    }

    /// Count of rows where `field` is `"Yes"`.
    pub fn count_yes(field: impl Into<String>) -> Self {
        Metric::CountWhereEquals {
            field: field.into(),
            value: YES.to_string(),
        }
    }

    /// Sum of `field`.
    pub fn sum(field: impl Into<String>) -> Self {
        Metric::Sum(field.into())
    }

    /// The wire key; `Metric::parse(&m.key()) == Some(m)`.
    pub fn key(&self) -> String {
        match self {
            Metric::Count => COUNT_KEY.to_string(),
            Metric::PercentOfTotal => PERCENT_KEY.to_string(),
            Metric::Average(field) => format!("__avg__{field}__"),
            Metric::CountWhereEquals { field, value } if value == YES => {
                format!("__count_yes__{field}__")
            }
            Metric::CountWhereEquals { field, value } => {
                format!("__count_where__{field}__{value}__")
            }
            Metric::Sum(field) => field.clone(),
        }
    }

    /// Column the metric reads, if any.
    pub fn source_field(&self) -> Option<&str> {
        match self {
            Metric::Count | Metric::PercentOfTotal => None,
            Metric::Average(field) | Metric::Sum(field) => Some(field),
            Metric::CountWhereEquals { field, .. } => Some(field),
        }
    }

    /// Whether the metric has no literal backing column of its own name.
    pub fn is_virtual(&self) -> bool {
        !matches!(self, Metric::Sum(_))
    }

    /// Whether values are whole counts rather than fractional measures.
    pub fn is_count_like(&self) -> bool {
        matches!(self, Metric::Count | Metric::CountWhereEquals { .. })
    }

    /// Label used when no override is configured.
    pub fn default_label(&self, field_label: impl Fn(&str) -> String) -> String {
        match self {
            Metric::Count => "Count of records".to_string(),
            Metric::PercentOfTotal => "Percent of total".to_string(),
            Metric::Average(field) => format!("Average {}", field_label(field)),
            Metric::CountWhereEquals { field, value } => {
                format!("{value} - {} (count)", field_label(field))
            }
            Metric::Sum(field) => field_label(field),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl TryFrom<String> for Metric {
    type Error = String;

    fn try_from(key: String) -> Result<Self, Self::Error> {
        Metric::parse(&key).ok_or_else(|| "metric key must not be empty".to_string())
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.key()
    }
}

/// How the allowed metrics for a grouping field are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityMode {
    /// Hand-curated table per grouping field, falling back to a default set.
    #[default]
    Curated,
    /// Count and percent-of-total, then every numeric measure in the registry.
    Generic,
}

/// Metric eligibility and labelling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    pub mode: EligibilityMode,
    /// Grouping field to its ordered metric list.
    pub table: HashMap<String, Vec<Metric>>,
    /// Metrics for grouping fields absent from `table`.
    pub defaults: Vec<Metric>,
    /// Metric key to display label.
    pub labels: HashMap<String, String>,
}

fn counts_and_averages(skip_yes: Option<&str>, with_age: bool, with_attempts: bool) -> Vec<Metric> {
    let mut metrics = vec![Metric::Count];
    if with_age {
        metrics.push(Metric::average("age"));
    }
    if with_attempts {
        metrics.push(Metric::average("courseattempt"));
    }
    for flag in ["upfront_fee_preference", "study_english"] {
        if skip_yes != Some(flag) {
            metrics.push(Metric::count_yes(flag));
        }
    }
    metrics
}

impl Default for MetricConfig {
    fn default() -> Self {
        let full = counts_and_averages(None, true, true);
        let mut table: HashMap<String, Vec<Metric>> = HashMap::new();

        for id_like in ["studentid", "coeno", "firstname", "lastname", "nickname"] {
            table.insert(id_like.to_string(), vec![Metric::Count]);
        }
        table.insert("age".to_string(), counts_and_averages(None, false, true));
        for field in ["nationality", "visa_status"] {
            table.insert(field.to_string(), counts_and_averages(None, true, false));
        }
        for field in [
            "age_group",
            "dob",
            "campus_name",
            "startdate",
            "finishdate",
            "intake_year",
            "intake_term",
            "study_reason",
            "mode_of_study",
            "previous_offer_intake",
            "previous_offer_year",
        ] {
            table.insert(field.to_string(), full.clone());
        }
        for flag in ["upfront_fee_preference", "study_english"] {
            table.insert(flag.to_string(), counts_and_averages(Some(flag), true, true));
        }
        table.insert(
            "offer_expiry_date".to_string(),
            vec![
                Metric::Count,
                Metric::average("age"),
                Metric::average("courseattempt"),
            ],
        );

        let labels = [
            (Metric::Count, "Students (count)"),
            (Metric::PercentOfTotal, "Percent of total"),
            (Metric::average("age"), "Average age"),
            (Metric::average("courseattempt"), "Average course attempts"),
            (Metric::count_yes("upfront_fee_preference"), "Yes - Upfront fee (count)"),
            (Metric::count_yes("study_english"), "Yes - Study English (count)"),
        ]
        .into_iter()
        .map(|(metric, label)| (metric.key(), label.to_string()))
        .collect();

        Self {
            mode: EligibilityMode::Curated,
            table,
            defaults: full,
            labels,
        }
    }
}

impl MetricConfig {
    /// Every virtual metric named anywhere in the configuration, in first-seen
    /// order with count and percent-of-total leading.
    pub fn declared_virtual_metrics(&self) -> Vec<Metric> {
        let mut seen = vec![Metric::Count, Metric::PercentOfTotal];
        let mut tables: Vec<(&String, &Vec<Metric>)> = self.table.iter().collect();
        tables.sort_by(|a, b| a.0.cmp(b.0));
        let declared = self
            .defaults
            .iter()
            .chain(tables.into_iter().flat_map(|(_, metrics)| metrics.iter()));
        for metric in declared {
            if metric.is_virtual() && !seen.contains(metric) {
                seen.push(metric.clone());
            }
        }
        seen
    }
}

/// A metric offered for a grouping field, with its display label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricOption {
    pub key: String,
    pub label: String,
    #[serde(skip)]
    pub metric: Metric,
}

/// Answers "which metrics may be plotted against this grouping field".
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    config: MetricConfig,
}

impl MetricCatalog {
    pub fn new(config: MetricConfig) -> Self {
        Self { config }
    }

    pub fn mode(&self) -> EligibilityMode {
        self.config.mode
    }

    /// Ordered metrics valid for `field`: count-style first, then averages,
    /// then conditional counts.
    ///
    /// Metrics whose backing rule is missing from the registry (for example
    /// an average over a column this dataset lacks) are left out.
    pub fn allowed_metrics(&self, field: &str, registry: &FieldRegistry) -> Vec<Metric> {
        let candidates: Vec<Metric> = match self.config.mode {
            EligibilityMode::Curated => self
                .config
                .table
                .get(field)
                .unwrap_or(&self.config.defaults)
                .clone(),
            EligibilityMode::Generic => {
                let mut metrics = vec![Metric::Count, Metric::PercentOfTotal];
                metrics.extend(
                    registry
                        .rules()
                        .filter(|rule| {
                            rule.has_role(FieldRole::Measure)
                                && rule.field_type == ColumnType::Numeric
                        })
                        .filter_map(|rule| Metric::parse(&rule.key)),
                );
                metrics
            }
        };

        let mut allowed: Vec<Metric> = Vec::with_capacity(candidates.len());
        for metric in candidates {
            if registry.contains(&metric.key()) && !allowed.contains(&metric) {
                allowed.push(metric);
            }
        }
        allowed
    }

    /// Allowed metrics paired with their labels, for selectors.
    pub fn metric_options(&self, field: &str, registry: &FieldRegistry) -> Vec<MetricOption> {
        self.allowed_metrics(field, registry)
            .into_iter()
            .map(|metric| MetricOption {
                key: metric.key(),
                label: self.label(&metric, registry),
                metric,
            })
            .collect()
    }

    /// Whether `metric` may be plotted against `field`.
    pub fn is_allowed(&self, field: &str, metric: &Metric, registry: &FieldRegistry) -> bool {
        self.allowed_metrics(field, registry).contains(metric)
    }

    /// Display label for a metric.
    pub fn label(&self, metric: &Metric, registry: &FieldRegistry) -> String {
        let key = metric.key();
        if let Some(label) = self.config.labels.get(&key) {
            return label.clone();
        }
        if let Some(rule) = registry.get(&key) {
            return rule.label.clone();
        }
        metric.default_label(|field| registry.label(field))
    }

    /// Label lookup without a registry, used while the registry is built.
    pub fn configured_label(&self, metric: &Metric) -> Option<&str> {
        self.config.labels.get(&metric.key()).map(String::as_str)
    }

    /// Maps a metric the registry cannot compute to a plain count.
    ///
    /// Only `Sum` over an undeclared or non-numeric column is affected.
    pub fn resolve(&self, metric: &Metric, registry: &FieldRegistry) -> Metric {
        match metric {
            Metric::Sum(field) => match registry.get(field) {
                Some(rule) if rule.field_type == ColumnType::Numeric => metric.clone(),
                _ => Metric::Count,
            },
            other => other.clone(),
        }
    }

    /// Parses and resolves a wire key; empty keys count rows.
    pub fn resolve_key(&self, key: &str, registry: &FieldRegistry) -> Metric {
        Metric::parse(key).map_or(Metric::Count, |metric| self.resolve(&metric, registry))
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self::new(MetricConfig::default())
    }
}
