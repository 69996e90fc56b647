//! A loaded dataset and the operations the dashboard runs against it.
//!
//! Loading runs the whole pipeline once: normalize headers, derive intake
//! and flag columns, drop rows failing validation, build the field registry,
//! canonicalise boolean columns and infer mutex pairs. The result is
//! immutable; reloading builds a new [`Dataset`].
//!
//! ```rust
//! use cohort_guard::prelude::*;
//! use serde_json::json;
//!
//! let rows = vec![
//!     json!({"Nationality": "Indian", "Age": 20}),
//!     json!({"Nationality": "Indian", "Age": 24}),
//!     json!({"Nationality": "Chinese", "Age": 30}),
//! ];
//! let config = EngineConfig::default().with_min_sample_size(3);
//! let dataset = Dataset::from_json_value(json!(rows), config).unwrap();
//!
//! let selection = Selection::new(ChartType::Bar)
//!     .group_by("nationality")
//!     .metric(Metric::average("age"));
//! let rendered = dataset.render(&selection).into_chart().unwrap();
//! assert_eq!(rendered.chart.labels, vec!["Indian", "Chinese"]);
//! assert_eq!(rendered.chart.series, vec![22.0, 30.0]);
//! ```

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::aggregation::{
    apply_field_filters, apply_metric_filters, group_by, unique_values, ChartData,
};
use crate::analyzers::MutexPairs;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::guard::{GuardOutcome, Selection, SelectionGuard};
use crate::log_data_op;
use crate::logging::LogConfig;
use crate::metrics::{Metric, MetricCatalog, MetricOption};
use crate::records::derive::{derive_domain_fields, validate_row, RowCheck};
use crate::records::{RawRow, Record};
use crate::registry::FieldRegistry;
use crate::sources::{parse_payload, DataSource};
use crate::summary::{summarize, ChartSummary};

/// Rows plus everything derived from them at load time.
#[derive(Debug, Clone)]
pub struct Dataset {
    rows: Vec<Record>,
    registry: FieldRegistry,
    mutex: MutexPairs,
    catalog: MetricCatalog,
    config: EngineConfig,
    log: LogConfig,
    dropped_rows: usize,
}

/// A chart that passed the guard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedChart {
    pub ok: bool,
    #[serde(flatten)]
    pub chart: ChartData,
    pub summary: ChartSummary,
    pub narrative: String,
}

/// Result of [`Dataset::render`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RenderOutcome {
    Rejected(GuardOutcome),
    Rendered(Box<RenderedChart>),
}

impl RenderOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered(_))
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            RenderOutcome::Rejected(outcome) => outcome.reason.as_deref(),
            RenderOutcome::Rendered(_) => None,
        }
    }

    pub fn into_chart(self) -> Option<RenderedChart> {
        match self {
            RenderOutcome::Rendered(chart) => Some(*chart),
            RenderOutcome::Rejected(_) => None,
        }
    }
}

impl Dataset {
    /// Fetches rows from `source` and builds the dataset.
    pub async fn load(source: &dyn DataSource, config: EngineConfig) -> Result<Self> {
        Self::load_with_logging(source, config, LogConfig::default()).await
    }

    #[instrument(skip_all, fields(source = %source.description()))]
    pub async fn load_with_logging(
        source: &dyn DataSource,
        config: EngineConfig,
        log: LogConfig,
    ) -> Result<Self> {
        let raw = source.fetch().await?;
        Ok(Self::from_raw_rows_with_logging(raw, config, log))
    }

    /// Builds the dataset from a decoded API payload.
    pub fn from_json_value(payload: Value, config: EngineConfig) -> Result<Self> {
        Ok(Self::from_raw_rows(parse_payload(payload)?, config))
    }

    /// Builds the dataset from the raw text of an API response.
    pub fn from_json_str(json: &str, config: EngineConfig) -> Result<Self> {
        Self::from_json_value(serde_json::from_str(json)?, config)
    }

    pub fn from_raw_rows(raw: Vec<RawRow>, config: EngineConfig) -> Self {
        Self::from_raw_rows_with_logging(raw, config, LogConfig::default())
    }

    pub fn from_raw_rows_with_logging(
        raw: Vec<RawRow>,
        config: EngineConfig,
        log: LogConfig,
    ) -> Self {
        let header_labels: HashMap<String, String> = raw
            .first()
            .map(|row| config.headers.original_labels(row))
            .unwrap_or_default();

        let mut dropped_rows = 0;
        let mut rows = Vec::with_capacity(raw.len());
        for raw_row in &raw {
            let mut record = config.headers.normalize_row(raw_row);
            derive_domain_fields(&mut record, &config.derivation);
            match validate_row(&record, &config.derivation) {
                RowCheck::Valid => rows.push(record),
                RowCheck::Invalid(_) => dropped_rows += 1,
            }
        }
        if dropped_rows > 0 {
            warn!(dropped = dropped_rows, "Dropped rows failing validation");
        }

        let registry = FieldRegistry::build(&rows, &header_labels, &config, &log);
        for row in &mut rows {
            registry.normalize_record(row);
        }

        let column_keys: Vec<&str> = registry
            .rules()
            .filter(|rule| !rule.is_virtual)
            .map(|rule| rule.key.as_str())
            .collect();
        let mutex = MutexPairs::infer(&rows, &column_keys, &config.mutex);
        let catalog = MetricCatalog::new(config.metrics.clone());

        log_data_op!(
            log,
            rows = rows.len(),
            dropped = dropped_rows,
            fields = registry.len(),
            mutex_pairs = mutex.len(),
            "Loaded dataset"
        );

        Self {
            rows,
            registry,
            mutex,
            catalog,
            config,
            log,
            dropped_rows,
        }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows removed at load because they failed validation.
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn mutex_pairs(&self) -> &MutexPairs {
        &self.mutex
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The guard bound to this dataset.
    pub fn guard(&self) -> SelectionGuard<'_> {
        SelectionGuard::new(&self.registry, &self.catalog, &self.mutex, &self.config.guards)
            .with_rejection_logging(self.log.log_guard_rejections)
    }

    /// Rows passing the selection's field filters.
    pub fn filtered_rows(&self, selection: &Selection) -> Vec<&Record> {
        apply_field_filters(&self.rows, &selection.filters)
    }

    /// Validates a selection without computing anything.
    pub fn check(&self, selection: &Selection) -> GuardOutcome {
        self.guard().check(selection, &self.filtered_rows(selection))
    }

    /// Guards, groups and aggregates one chart.
    pub fn render(&self, selection: &Selection) -> RenderOutcome {
        let rows = self.filtered_rows(selection);
        let outcome = self.guard().check(selection, &rows);
        let (true, Some(group), Some(metric)) =
            (outcome.ok, &selection.group_field, &selection.metric)
        else {
            return RenderOutcome::Rejected(outcome);
        };

        let metric = self.catalog.resolve(metric, &self.registry);
        let groups = apply_metric_filters(
            group_by(rows.iter().copied(), group),
            &selection.metric_filters,
        );

        let metric_label = self.metric_label(&metric);
        let field_label = self.registry.label(group);
        let chart = ChartData::from_groups(
            format!("{metric_label} by {field_label}"),
            &groups,
            &metric,
        );
        let summary = summarize(
            selection.chart_type,
            &metric,
            &metric_label,
            &field_label,
            &groups,
            &chart.series,
        );
        let narrative = summary.render_text();

        RenderOutcome::Rendered(Box::new(RenderedChart {
            ok: true,
            chart,
            summary,
            narrative,
        }))
    }

    /// Series for a metric given by wire key, without guarding.
    ///
    /// Keys the registry cannot compute fall back to a row count.
    pub fn series_by_key(&self, group_field: &str, metric_key: &str) -> ChartData {
        let metric = self.catalog.resolve_key(metric_key, &self.registry);
        let groups = group_by(&self.rows, group_field);
        ChartData::from_groups(
            format!(
                "{} by {}",
                self.metric_label(&metric),
                self.registry.label(group_field)
            ),
            &groups,
            &metric,
        )
    }

    /// Metrics offered for a grouping field, with labels.
    pub fn allowed_metrics(&self, field: &str) -> Vec<MetricOption> {
        self.catalog.metric_options(field, &self.registry)
    }

    /// Distinct values of a field, for filter selectors.
    pub fn unique_values(&self, field: &str) -> Vec<String> {
        unique_values(&self.rows, field)
    }

    pub fn metric_label(&self, metric: &Metric) -> String {
        self.catalog.label(metric, &self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{ComparisonOp, MetricFilter};
    use crate::guard::{ChartType, GuardRule};
    use crate::test_fixtures::enrollment_raw_rows;
    use serde_json::json;

    fn dataset() -> Dataset {
        Dataset::from_raw_rows(enrollment_raw_rows(24), EngineConfig::default())
    }

    #[test]
    fn test_pipeline_builds_everything() {
        let dataset = dataset();
        assert_eq!(dataset.len(), 24);
        assert_eq!(dataset.dropped_rows(), 0);
        assert_eq!(dataset.registry().label("nationality"), "Nationality");
        assert!(dataset.registry().contains("intake_term"));
        assert!(dataset
            .mutex_pairs()
            .is_mutex("courseid", "coursename"));
        assert!(!dataset.mutex_pairs().is_mutex("nationality", "age"));
    }

    #[test]
    fn test_invalid_rows_dropped() {
        let mut raw = enrollment_raw_rows(6);
        raw[0].insert("StartDate".to_string(), json!("2025-01-01"));
        raw[0].insert("FinishDate".to_string(), json!("2024-01-01"));

        let dataset = Dataset::from_raw_rows(raw, EngineConfig::default());
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.dropped_rows(), 1);
    }

    #[test]
    fn test_render_count_by_nationality() {
        let dataset = dataset();
        let selection = Selection::new(ChartType::Bar)
            .group_by("nationality")
            .metric(Metric::Count);

        let chart = dataset.render(&selection).into_chart().unwrap();
        assert_eq!(
            chart.chart.labels,
            vec!["Indian", "Chinese", "Nepalese", "Vietnamese"]
        );
        assert_eq!(chart.chart.series, vec![6.0; 4]);
        assert_eq!(chart.chart.title, "Students (count) by Nationality");
        assert!(chart.narrative.contains("Total students: 24"));
    }

    #[test]
    fn test_render_rejects_and_filters() {
        let dataset = dataset();
        let selection = Selection::new(ChartType::Bar)
            .group_by("nationality")
            .metric(Metric::Count)
            .filter("nationality", "Indian")
            .filter("campus_name", "Sydney");

        let outcome = dataset.render(&selection);
        assert!(!outcome.is_rendered());
        assert_eq!(
            outcome.reason(),
            Some("Not enough rows after filters (min 5).")
        );
    }

    #[test]
    fn test_render_applies_metric_filters() {
        let dataset = dataset();
        let selection = Selection::new(ChartType::Bar)
            .group_by("age")
            .metric(Metric::Count)
            .metric_filter(MetricFilter::new(
                Metric::Count,
                ComparisonOp::GreaterThan,
                4.0,
            ));

        let chart = dataset.render(&selection).into_chart().unwrap();
        assert_eq!(chart.chart.labels, vec!["18", "21", "24", "27"]);
        assert_eq!(chart.chart.series, vec![5.0; 4]);
    }

    #[test]
    fn test_time_field_guards() {
        let dataset = dataset();
        let selection = Selection::new(ChartType::Bar)
            .group_by("startdate")
            .metric(Metric::average("age"));
        assert!(dataset.check(&selection).is_ok());

        let selection = Selection::new(ChartType::Pie)
            .group_by("startdate")
            .metric(Metric::Count);
        assert_eq!(dataset.check(&selection).rule, Some(GuardRule::TimeOnPie));
    }

    #[test]
    fn test_series_by_key_falls_back_to_count() {
        let dataset = dataset();
        let by_unknown = dataset.series_by_key("nationality", "__no_such_metric__");
        let by_count = dataset.series_by_key("nationality", "__count__");
        assert_eq!(by_unknown.series, by_count.series);
    }

    #[test]
    fn test_allowed_metrics_and_unique_values() {
        let dataset = dataset();
        let keys: Vec<String> = dataset
            .allowed_metrics("campus_name")
            .into_iter()
            .map(|option| option.key)
            .collect();
        assert_eq!(
            keys,
            vec![
                "__count__",
                "__avg__age__",
                "__avg__courseattempt__",
                "__count_yes__upfront_fee_preference__",
                "__count_yes__study_english__",
            ]
        );
        assert_eq!(
            dataset.unique_values("campus_name"),
            vec!["Brisbane", "Melbourne", "Sydney"]
        );
    }

    #[tokio::test]
    async fn test_load_from_source() {
        let source = crate::sources::MemorySource::new(enrollment_raw_rows(10));
        let dataset = Dataset::load(&source, EngineConfig::default()).await.unwrap();
        assert_eq!(dataset.len(), 10);
    }

    #[test]
    fn test_from_json_str_errors() {
        assert!(Dataset::from_json_str("{\"rows\": []}", EngineConfig::default()).is_err());
        let empty = Dataset::from_json_str("[]", EngineConfig::default()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.registry().contains("__count__"));
    }
}
