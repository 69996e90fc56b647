//! Pre-render validation of a chart selection.
//!
//! [`SelectionGuard::check`] runs eight rules in a fixed order and stops at
//! the first failure:
//!
//! 1. a grouping field and a metric are both chosen;
//! 2. both resolve to a field rule;
//! 3. the metric is allowed for the grouping field;
//! 4. the two are not a mutex pair;
//! 5. enough rows survive the filters;
//! 6. non-line charts stay under the field's category cap;
//! 7. pie and doughnut charts stay under the tighter pie cap;
//! 8. time fields are not drawn as pies.
//!
//! A rejection is an ordinary [`GuardOutcome`] carrying user-facing text.
//!
//! ```rust
//! use cohort_guard::prelude::*;
//! use serde_json::json;
//!
//! let rows: Vec<RawRow> = (0..6)
//!     .map(|i| json!({"Nationality": if i % 2 == 0 { "Indian" } else { "Chinese" }, "Age": 20 + i}))
//!     .filter_map(|v| v.as_object().cloned())
//!     .collect();
//! let dataset = Dataset::from_raw_rows(rows, EngineConfig::default());
//!
//! let pie = Selection::new(ChartType::Pie).group_by("nationality").metric(Metric::Count);
//! assert!(dataset.check(&pie).is_ok());
//!
//! let incomplete = Selection::new(ChartType::Bar).group_by("nationality");
//! assert_eq!(dataset.check(&incomplete).rule, Some(GuardRule::MissingSelection));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregation::{distinct_count, FieldFilter, MetricFilter};
use crate::analyzers::MutexPairs;
use crate::metrics::{Metric, MetricCatalog};
use crate::records::Record;
use crate::registry::FieldRegistry;

/// Chart kinds the presentation layer draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
    Doughnut,
}

impl ChartType {
    pub fn name(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
            ChartType::Doughnut => "doughnut",
        }
    }

    /// Pie and doughnut share the tighter category cap.
    pub fn is_circular(&self) -> bool {
        matches!(self, ChartType::Pie | ChartType::Doughnut)
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Ok(ChartType::Bar),
            "line" => Ok(ChartType::Line),
            "pie" => Ok(ChartType::Pie),
            "doughnut" => Ok(ChartType::Doughnut),
            other => Err(format!("unknown chart type {other:?}")),
        }
    }
}

/// Thresholds applied by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Minimum rows after field filters.
    pub min_sample_size: usize,
    /// Category cap for fields without their own.
    pub max_axis_categories: usize,
    /// Category cap for pie and doughnut charts.
    pub pie_max_categories: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 5,
            max_axis_categories: 200,
            pie_max_categories: 12,
        }
    }
}

/// Everything a user chose for one chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    #[serde(alias = "xField")]
    pub group_field: Option<String>,
    /// A blank key deserializes as "not chosen".
    #[serde(alias = "yField", deserialize_with = "optional_metric")]
    pub metric: Option<Metric>,
    pub filters: Vec<FieldFilter>,
    #[serde(alias = "metricFilters")]
    pub metric_filters: Vec<MetricFilter>,
}

fn optional_metric<'de, D>(deserializer: D) -> Result<Option<Metric>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let key: Option<String> = Option::deserialize(deserializer)?;
    Ok(key.as_deref().and_then(Metric::parse))
}

impl Selection {
    pub fn new(chart_type: ChartType) -> Self {
        Self {
            chart_type,
            ..Self::default()
        }
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_field = Some(field.into());
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = Some(metric);
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(FieldFilter::new(field, value));
        self
    }

    pub fn metric_filter(mut self, filter: MetricFilter) -> Self {
        self.metric_filters.push(filter);
        self
    }
}

/// Which rule rejected a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardRule {
    MissingSelection,
    UnknownField,
    MetricNotAllowed,
    MutexPair,
    InsufficientRows,
    TooManyCategories,
    TooManyPieCategories,
    TimeOnPie,
}

/// Result of a guard check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<GuardRule>,
}

impl GuardOutcome {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            reason: None,
            rule: None,
        }
    }

    pub fn rejected(rule: GuardRule, reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            rule: Some(rule),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }
}

/// Validates selections against one dataset's registry and mutex pairs.
#[derive(Debug, Clone, Copy)]
pub struct SelectionGuard<'a> {
    registry: &'a FieldRegistry,
    catalog: &'a MetricCatalog,
    mutex: &'a MutexPairs,
    config: &'a GuardConfig,
    log_rejections: bool,
}

impl<'a> SelectionGuard<'a> {
    pub fn new(
        registry: &'a FieldRegistry,
        catalog: &'a MetricCatalog,
        mutex: &'a MutexPairs,
        config: &'a GuardConfig,
    ) -> Self {
        Self {
            registry,
            catalog,
            mutex,
            config,
            log_rejections: true,
        }
    }

    pub fn with_rejection_logging(mut self, enabled: bool) -> Self {
        self.log_rejections = enabled;
        self
    }

    /// Checks `selection` against `rows`, the rows left after field filters.
    pub fn check(&self, selection: &Selection, rows: &[&Record]) -> GuardOutcome {
        let outcome = self.evaluate(selection, rows);
        if self.log_rejections {
            if let (Some(rule), Some(reason)) = (&outcome.rule, &outcome.reason) {
                debug!(
                    rule = ?rule,
                    reason = %reason,
                    chart_type = %selection.chart_type,
                    group_field = ?selection.group_field,
                    "Selection rejected"
                );
            }
        }
        outcome
    }

    fn evaluate(&self, selection: &Selection, rows: &[&Record]) -> GuardOutcome {
        let group = selection
            .group_field
            .as_deref()
            .filter(|field| !field.trim().is_empty());
        let (Some(group), Some(metric)) = (group, &selection.metric) else {
            return GuardOutcome::rejected(
                GuardRule::MissingSelection,
                "Please select both a grouping field and a metric.",
            );
        };

        let metric_key = metric.key();
        let Some(group_rule) = self.registry.get(group) else {
            return GuardOutcome::rejected(GuardRule::UnknownField, "Invalid field selected.");
        };
        if !self.registry.contains(&metric_key) {
            return GuardOutcome::rejected(GuardRule::UnknownField, "Invalid field selected.");
        }

        if !self.catalog.is_allowed(group, metric, self.registry) {
            return GuardOutcome::rejected(
                GuardRule::MetricNotAllowed,
                format!("Metric \"{metric_key}\" is not allowed for grouping field \"{group}\"."),
            );
        }

        let redundant = self.mutex.is_mutex(group, &metric_key)
            || metric
                .source_field()
                .map_or(false, |source| self.mutex.is_mutex(group, source));
        if redundant {
            return GuardOutcome::rejected(
                GuardRule::MutexPair,
                "Choose either the code field or the name field, not both.",
            );
        }

        if rows.len() < self.config.min_sample_size {
            return GuardOutcome::rejected(
                GuardRule::InsufficientRows,
                format!(
                    "Not enough rows after filters (min {}).",
                    self.config.min_sample_size
                ),
            );
        }

        let chart_type = selection.chart_type;
        if chart_type != ChartType::Line {
            let categories = distinct_count(rows.iter().copied(), group);

            let cap = group_rule
                .max_axis_cardinality
                .unwrap_or(self.config.max_axis_categories);
            if categories > cap {
                return GuardOutcome::rejected(
                    GuardRule::TooManyCategories,
                    format!(
                        "Too many categories on {} ({categories}). Add a filter or switch chart.",
                        group_rule.label
                    ),
                );
            }

            if chart_type.is_circular() && categories > self.config.pie_max_categories {
                return GuardOutcome::rejected(
                    GuardRule::TooManyPieCategories,
                    format!(
                        "Pie charts work best with ≤{} categories.",
                        self.config.pie_max_categories
                    ),
                );
            }
        }

        if chart_type.is_circular() && group_rule.temporal {
            return GuardOutcome::rejected(
                GuardRule::TimeOnPie,
                format!("Use bar/line for time on {}.", group_rule.label),
            );
        }

        GuardOutcome::accepted()
    }
}
