//! Grouping, series computation and filters.
//!
//! Everything here is total: malformed values are skipped or count as zero,
//! empty inputs give empty outputs, and no function returns an error.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::metrics::Metric;
use crate::records::{as_number, group_label, Record};

/// Rows partitioned by the value of one field, in first-appearance order.
///
/// Missing and null values land in the `"Unknown"` bucket.
#[derive(Debug, Clone, Default)]
pub struct Groups<'a> {
    labels: Vec<String>,
    buckets: Vec<Vec<&'a Record>>,
    index: HashMap<String, usize>,
}

impl<'a> Groups<'a> {
    /// Group labels in iteration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Rows of one group.
    pub fn get(&self, label: &str) -> Option<&[&'a Record]> {
        self.index.get(label).map(|&i| self.buckets[i].as_slice())
    }

    /// `(label, rows)` pairs in iteration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[&'a Record])> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.buckets.iter().map(Vec::as_slice))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows across all groups.
    pub fn total_rows(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    fn push(&mut self, label: String, row: &'a Record) {
        match self.index.get(&label) {
            Some(&i) => self.buckets[i].push(row),
            None => {
                self.index.insert(label.clone(), self.labels.len());
                self.labels.push(label);
                self.buckets.push(vec![row]);
            }
        }
    }

    /// Keeps the groups whose position satisfies `keep`, preserving order.
    fn retain_positions(self, keep: &[bool]) -> Self {
        let mut kept = Groups::default();
        for ((label, bucket), &k) in self.labels.into_iter().zip(self.buckets).zip(keep) {
            if k {
                kept.index.insert(label.clone(), kept.labels.len());
                kept.labels.push(label);
                kept.buckets.push(bucket);
            }
        }
        kept
    }
}

/// Partitions `rows` by `field`.
pub fn group_by<'a, I>(rows: I, field: &str) -> Groups<'a>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut groups = Groups::default();
    for row in rows {
        groups.push(row.group_label(field), row);
    }
    groups
}

/// Number of distinct grouping values, counting missing values once as `"Unknown"`.
pub fn distinct_count<'a, I>(rows: I, field: &str) -> usize
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut seen = std::collections::HashSet::new();
    for row in rows {
        seen.insert(group_label(row.get(field)));
    }
    seen.len()
}

/// One value per group, in the groups' iteration order.
pub fn compute_series(groups: &Groups<'_>, metric: &Metric) -> Vec<f64> {
    let total = groups.total_rows();
    groups
        .iter()
        .map(|(_, rows)| metric_value(rows, metric, total))
        .collect()
}

/// Value of `metric` over one group of rows; `total` is the row count across
/// all groups.
pub fn metric_value(rows: &[&Record], metric: &Metric, total: usize) -> f64 {
    match metric {
        Metric::Count => rows.len() as f64,
        Metric::PercentOfTotal => {
            if total == 0 {
                0.0
            } else {
                100.0 * rows.len() as f64 / total as f64
            }
        }
        Metric::Average(field) => mean(rows.iter().filter_map(|row| row.number(field))),
        Metric::CountWhereEquals { field, value } => rows
            .iter()
            .filter(|row| row.display(field) == *value)
            .count() as f64,
        Metric::Sum(field) => rows.iter().filter_map(|row| row.number(field)).sum(),
    }
}

/// Mean of the values, or 0 when there are none.
pub fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Equality filter on a field's string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether the row's value renders exactly as `value` (null as `"null"`).
    pub fn matches(&self, row: &Record) -> bool {
        row.display(&self.field) == self.value
    }
}

impl FromStr for FieldFilter {
    type Err = String;

    /// Parses `field=value`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected field=value, got {s:?}"))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("missing field name in {s:?}"));
        }
        Ok(Self::new(field, value))
    }
}

/// Rows passing every filter.
pub fn apply_field_filters<'a>(rows: &'a [Record], filters: &[FieldFilter]) -> Vec<&'a Record> {
    rows.iter()
        .filter(|row| filters.iter().all(|f| f.matches(row)))
        .collect()
}

/// Comparison applied by a [`MetricFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "<")]
    LessThan,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterOrEqual => ">=",
            ComparisonOp::Equal => "=",
            ComparisonOp::LessOrEqual => "<=",
            ComparisonOp::LessThan => "<",
        }
    }

    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOp::GreaterThan => value > threshold,
            ComparisonOp::GreaterOrEqual => value >= threshold,
            ComparisonOp::Equal => value == threshold,
            ComparisonOp::LessOrEqual => value <= threshold,
            ComparisonOp::LessThan => value < threshold,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ComparisonOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(ComparisonOp::GreaterThan),
            ">=" => Ok(ComparisonOp::GreaterOrEqual),
            "=" | "==" => Ok(ComparisonOp::Equal),
            "<=" => Ok(ComparisonOp::LessOrEqual),
            "<" => Ok(ComparisonOp::LessThan),
            other => Err(format!("unknown comparison operator {other:?}")),
        }
    }
}

/// Keeps a group only when its value of `metric` compares true against `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFilter {
    pub metric: Metric,
    pub op: ComparisonOp,
    #[serde(alias = "value", deserialize_with = "lenient_threshold")]
    pub threshold: f64,
}

/// Accepts a number or a numeric string; anything else becomes NaN and the
/// filter is ignored.
fn lenient_threshold<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n,
        Raw::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        Raw::Other(_) => f64::NAN,
    })
}

impl MetricFilter {
    pub fn new(metric: Metric, op: ComparisonOp, threshold: f64) -> Self {
        Self {
            metric,
            op,
            threshold,
        }
    }
}

/// Drops groups failing any metric filter.
///
/// Every filter is evaluated against the unfiltered groups, so
/// percent-of-total keeps its original denominator. Filters with a
/// non-finite threshold are ignored.
pub fn apply_metric_filters<'a>(groups: Groups<'a>, filters: &[MetricFilter]) -> Groups<'a> {
    let active: Vec<&MetricFilter> = filters.iter().filter(|f| f.threshold.is_finite()).collect();
    if active.is_empty() {
        return groups;
    }

    let mut keep = vec![true; groups.len()];
    for filter in active {
        let series = compute_series(&groups, &filter.metric);
        for (pass, value) in keep.iter_mut().zip(series) {
            *pass = *pass && filter.op.holds(value, filter.threshold);
        }
    }
    groups.retain_positions(&keep)
}

/// Distinct values of a field for filter selectors.
///
/// Numeric values come first in numeric order, the rest follow ordered by
/// their string form.
pub fn unique_values(rows: &[Record], field: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut values: Vec<(String, Option<f64>)> = Vec::new();
    for row in rows {
        let value = row.get(field);
        let display = row.display(field);
        if seen.insert(display.clone()) {
            values.push((display, value.and_then(as_number)));
        }
    }
    values.sort_by(|(a, na), (b, nb)| match (na, nb) {
        (Some(x), Some(y)) => x.total_cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    values.into_iter().map(|(display, _)| display).collect()
}

/// Series and labels ready for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub title: String,
    pub labels: Vec<String>,
    pub series: Vec<f64>,
}

impl ChartData {
    pub fn from_groups(title: impl Into<String>, groups: &Groups<'_>, metric: &Metric) -> Self {
        Self {
            title: title.into(),
            labels: groups.labels().to_vec(),
            series: compute_series(groups, metric),
        }
    }
}
