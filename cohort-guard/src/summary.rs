//! Plain-language summaries of a rendered chart.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::aggregation::Groups;
use crate::guard::ChartType;
use crate::metrics::Metric;

const TOP_GROUPS: usize = 5;

/// A group and its plotted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupValue {
    pub label: String,
    pub value: f64,
    /// Percentage of the grouped rows, for count charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
}

/// Direction of a line chart from its first to its last point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "lowercase")]
pub enum Trend {
    Rising { from: f64, to: f64 },
    Falling { from: f64, to: f64 },
    Flat,
}

/// Metric-specific figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Highlights {
    Count {
        total: usize,
        largest: Option<GroupValue>,
        smallest: Option<GroupValue>,
    },
    Average {
        overall: f64,
        highest: Option<GroupValue>,
        lowest: Option<GroupValue>,
    },
    Matches {
        value: String,
        matched: usize,
        base: usize,
        pct: f64,
        most: Option<GroupValue>,
        fewest: Option<GroupValue>,
    },
    Values {
        highest: Option<GroupValue>,
        lowest: Option<GroupValue>,
    },
}

/// Narrative summary of one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSummary {
    pub title: String,
    pub field_label: String,
    pub highlights: Highlights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
    /// Up to five groups by descending value.
    pub top: Vec<GroupValue>,
    /// Decimal places used for non-count values.
    pub decimals: usize,
}

fn share(part: f64, total: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        100.0 * part / total
    }
}

/// Index of the first maximum and first minimum.
fn extremes(values: &[f64]) -> Option<(usize, usize)> {
    let first = *values.first()?;
    let (mut max_i, mut min_i) = (0, 0);
    let (mut max, mut min) = (first, first);
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > max {
            max = v;
            max_i = i;
        }
        if v < min {
            min = v;
            min_i = i;
        }
    }
    Some((max_i, min_i))
}

/// Builds the summary for `series` plotted over `groups`.
pub fn summarize(
    chart_type: ChartType,
    metric: &Metric,
    metric_label: &str,
    field_label: &str,
    groups: &Groups<'_>,
    series: &[f64],
) -> ChartSummary {
    let labels = groups.labels();
    let total = groups.total_rows();
    let at = |i: usize, with_share: bool| GroupValue {
        label: labels[i].clone(),
        value: series[i],
        share: with_share.then(|| share(series[i], total as f64)),
    };
    let pick = |with_share: bool| match extremes(series) {
        Some((hi, lo)) => (Some(at(hi, with_share)), (lo != hi).then(|| at(lo, with_share))),
        None => (None, None),
    };

    let highlights = match metric {
        Metric::Count => {
            let (largest, smallest) = pick(true);
            Highlights::Count {
                total,
                largest,
                smallest,
            }
        }
        Metric::Average(field) => {
            let values = groups
                .iter()
                .flat_map(|(_, rows)| rows.iter().filter_map(|row| row.number(field)));
            let (highest, lowest) = pick(false);
            Highlights::Average {
                overall: crate::aggregation::mean(values),
                highest,
                lowest,
            }
        }
        Metric::CountWhereEquals { field, value } => {
            let (mut matched, mut base) = (0, 0);
            for (_, rows) in groups.iter() {
                for row in rows {
                    if row.get(field).map_or(false, |v| !v.is_null()) {
                        base += 1;
                        if row.display(field) == *value {
                            matched += 1;
                        }
                    }
                }
            }
            let (most, fewest) = pick(false);
            Highlights::Matches {
                value: value.clone(),
                matched,
                base,
                pct: share(matched as f64, base as f64),
                most,
                fewest,
            }
        }
        Metric::PercentOfTotal | Metric::Sum(_) => {
            let (highest, lowest) = pick(false);
            Highlights::Values { highest, lowest }
        }
    };

    let trend = (chart_type == ChartType::Line && *metric == Metric::Count && series.len() >= 3)
        .then(|| {
            let (from, to) = (series[0], series[series.len() - 1]);
            if to > from {
                Trend::Rising { from, to }
            } else if to < from {
                Trend::Falling { from, to }
            } else {
                Trend::Flat
            }
        });

    let mut order: Vec<usize> = (0..series.len().min(labels.len())).collect();
    order.sort_by(|&a, &b| series[b].total_cmp(&series[a]));
    let top = order
        .into_iter()
        .take(TOP_GROUPS)
        .map(|i| at(i, false))
        .collect();

    let decimals = match metric {
        Metric::Average(field) if field == "age" => 1,
        Metric::Count | Metric::CountWhereEquals { .. } => 0,
        _ => 2,
    };

    ChartSummary {
        title: format!("{metric_label} by {field_label}"),
        field_label: field_label.to_string(),
        highlights,
        trend,
        top,
        decimals,
    }
}

/// Whole number with thousands separators.
pub fn format_int(value: f64) -> String {
    let rounded = if value.is_finite() { value.round() as i64 } else { 0 };
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Fixed-point number; non-finite values print as zero.
pub fn format_float(value: f64, decimals: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{value:.decimals$}")
}

impl ChartSummary {
    fn value_text(&self, value: f64) -> String {
        if self.decimals == 0 {
            format_int(value)
        } else {
            format_float(value, self.decimals)
        }
    }

    /// Bullet-point narrative, one fact per line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Chart: {}", self.title);
        let line = |out: &mut String,
                    prefix: &str,
                    group: &Option<GroupValue>,
                    text: &dyn Fn(&GroupValue) -> String| {
            if let Some(group) = group {
                let _ = writeln!(out, "• {prefix}: {} - {}", group.label, text(group));
            }
        };

        match &self.highlights {
            Highlights::Count {
                total,
                largest,
                smallest,
            } => {
                let _ = writeln!(out, "• Total students: {}", format_int(*total as f64));
                let with_share = |g: &GroupValue| {
                    format!(
                        "{} ({}%)",
                        format_int(g.value),
                        format_float(g.share.unwrap_or(0.0), 0)
                    )
                };
                line(&mut out, "Largest group", largest, &with_share);
                line(&mut out, "Smallest group", smallest, &with_share);
            }
            Highlights::Average {
                overall,
                highest,
                lowest,
            } => {
                let _ = writeln!(out, "• Overall average: {}", self.value_text(*overall));
                let value = |g: &GroupValue| self.value_text(g.value);
                line(&mut out, "Highest average", highest, &value);
                line(&mut out, "Lowest average", lowest, &value);
            }
            Highlights::Matches {
                value,
                matched,
                base,
                pct,
                most,
                fewest,
            } => {
                let _ = writeln!(
                    out,
                    "• {value}: {} of {} total ({}%)",
                    format_int(*matched as f64),
                    format_int(*base as f64),
                    format_float(*pct, 0)
                );
                let count = |g: &GroupValue| format_int(g.value);
                line(
                    &mut out,
                    &format!("Most {value} by {}", self.field_label),
                    most,
                    &count,
                );
                line(
                    &mut out,
                    &format!("Fewest {value} by {}", self.field_label),
                    fewest,
                    &count,
                );
            }
            Highlights::Values { highest, lowest } => {
                let value = |g: &GroupValue| self.value_text(g.value);
                line(&mut out, "Highest", highest, &value);
                line(&mut out, "Lowest", lowest, &value);
            }
        }

        match &self.trend {
            Some(Trend::Rising { from, to }) => {
                let _ = writeln!(
                    out,
                    "• Trend: rising from {} to {}.",
                    format_int(*from),
                    format_int(*to)
                );
            }
            Some(Trend::Falling { from, to }) => {
                let _ = writeln!(
                    out,
                    "• Trend: falling from {} to {}.",
                    format_int(*from),
                    format_int(*to)
                );
            }
            Some(Trend::Flat) => {
                let _ = writeln!(out, "• Trend: flat overall.");
            }
            None => {}
        }

        if !self.top.is_empty() {
            let _ = writeln!(out, "\nTop {}:", self.top.len());
            for group in &self.top {
                let _ = writeln!(out, "  - {}: {}", group.label, self.value_text(group.value));
            }
        }

        out.trim_end().to_string()
    }
}
