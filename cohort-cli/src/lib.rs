//! Cohort CLI - command-line front ends for the cohort-guard engine
//!
//! Shared plumbing for the `cohort-*` binaries: tracing setup, dataset
//! loading and JSON output.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use cohort_guard::aggregation::{ComparisonOp, MetricFilter};
use cohort_guard::analyzers::MutexPairs;
use cohort_guard::config::EngineConfig;
use cohort_guard::dataset::Dataset;
use cohort_guard::logging::setup::{init_logging, LoggingConfig};
use cohort_guard::metrics::{Metric, MetricOption};
use cohort_guard::registry::FieldRule;
use cohort_guard::sources::{DataSource, JsonFileSource};
use serde::Serialize;

/// Installs the JSON stderr subscriber shared by every binary.
pub fn init_tracing() -> Result<()> {
    init_logging(LoggingConfig::production().with_level(tracing::Level::INFO))
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

/// Reads an engine config file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("loading engine config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Picks a data source for `location`: an URL when built with the `http`
/// feature, a JSON file otherwise.
pub fn data_source(location: &str) -> Box<dyn DataSource> {
    #[cfg(feature = "http")]
    {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Box::new(cohort_guard::sources::HttpSource::new(location));
        }
    }
    Box::new(JsonFileSource::new(location))
}

/// Loads and prepares a dataset.
pub async fn load_dataset(location: &str, config: Option<&Path>) -> Result<Dataset> {
    let config = load_config(config)?;
    let source = data_source(location);
    let dataset = Dataset::load(source.as_ref(), config)
        .await
        .with_context(|| format!("loading dataset from {}", source.description()))?;
    Ok(dataset)
}

/// Parses `metric<op>threshold`, e.g. `__count__>=10`.
pub fn parse_metric_filter(input: &str) -> Result<MetricFilter> {
    let start = input
        .find(['<', '>', '='])
        .ok_or_else(|| anyhow!("metric filter {input:?} has no comparison operator"))?;
    let (metric, rest) = input.split_at(start);
    let op_len = rest
        .chars()
        .take_while(|c| matches!(c, '<' | '>' | '='))
        .count();
    let (op, threshold) = rest.split_at(op_len);

    let metric = Metric::parse(metric)
        .ok_or_else(|| anyhow!("metric filter {input:?} has no metric"))?;
    let op: ComparisonOp = op.parse().map_err(|e: String| anyhow!(e))?;
    let threshold: f64 = threshold
        .trim()
        .parse()
        .with_context(|| format!("invalid threshold in {input:?}"))?;
    Ok(MetricFilter::new(metric, op, threshold))
}

/// What `cohort-fields` prints: every rule, the inferred mutex pairs and
/// the metrics offered per grouping field.
#[derive(Debug, Serialize)]
pub struct FieldReport<'a> {
    pub rows: usize,
    pub dropped_rows: usize,
    pub fields: Vec<&'a FieldRule>,
    pub mutex_pairs: &'a MutexPairs,
    pub allowed_metrics: BTreeMap<String, Vec<MetricOption>>,
}

impl<'a> FieldReport<'a> {
    /// Report over every grouping candidate.
    pub fn new(dataset: &'a Dataset) -> Self {
        let groups: Vec<&str> = dataset
            .registry()
            .grouping_candidates()
            .into_iter()
            .map(|rule| rule.key.as_str())
            .collect();
        Self::for_groups(dataset, &groups)
    }

    /// Report listing allowed metrics for `groups` only.
    pub fn for_groups(dataset: &'a Dataset, groups: &[&str]) -> Self {
        Self {
            rows: dataset.len(),
            dropped_rows: dataset.dropped_rows(),
            fields: dataset.registry().rules().collect(),
            mutex_pairs: dataset.mutex_pairs(),
            allowed_metrics: groups
                .iter()
                .map(|group| (group.to_string(), dataset.allowed_metrics(group)))
                .collect(),
        }
    }
}

/// Writes `value` to stdout as pretty JSON.
pub fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric_filter() {
        let filter = parse_metric_filter("__count__>=10").unwrap();
        assert_eq!(filter.metric, Metric::Count);
        assert_eq!(filter.op, ComparisonOp::GreaterOrEqual);
        assert_eq!(filter.threshold, 10.0);

        let filter = parse_metric_filter("__avg__age__< 25.5").unwrap();
        assert_eq!(filter.metric, Metric::average("age"));
        assert_eq!(filter.op, ComparisonOp::LessThan);
        assert_eq!(filter.threshold, 25.5);
    }

    #[test]
    fn test_parse_metric_filter_errors() {
        assert!(parse_metric_filter("__count__").is_err());
        assert!(parse_metric_filter(">5").is_err());
        assert!(parse_metric_filter("__count__=>5").is_err());
        assert!(parse_metric_filter("__count__>lots").is_err());
    }

    #[test]
    fn test_init_tracing_installs_once() {
        assert!(init_tracing().is_ok());
        assert!(init_tracing().is_err());
    }

    #[tokio::test]
    async fn test_load_dataset_with_config() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("rows.json");
        std::fs::write(
            &data,
            r#"[{"Nationality": "Indian", "Age": 20}, {"Nationality": "Chinese", "Age": 30}]"#,
        )
        .unwrap();
        let config = dir.path().join("engine.json");
        std::fs::write(&config, r#"{"guards": {"min_sample_size": 2}}"#).unwrap();

        let dataset = load_dataset(data.to_str().unwrap(), Some(&config))
            .await
            .unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.config().guards.min_sample_size, 2);

        let report = FieldReport::new(&dataset);
        assert!(report.fields.iter().any(|rule| rule.key == "nationality"));
        assert_eq!(report.allowed_metrics["nationality"][0].key, "__count__");
        assert!(report.allowed_metrics.contains_key("age"));

        let report = FieldReport::for_groups(&dataset, &["age"]);
        assert_eq!(report.allowed_metrics.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_dataset_reports_location() {
        let err = load_dataset("/nonexistent/rows.json", None).await.unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/rows.json"));
    }
}
