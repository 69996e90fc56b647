//! Saved dashboards: an ordered list of chart selections persisted as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{Dataset, RenderOutcome};
use crate::error::{ErrorContext, Result};
use crate::guard::Selection;

/// One chart card of a dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub selection: Selection,
}

impl ChartSpec {
    pub fn new(selection: Selection) -> Self {
        Self {
            title: None,
            selection,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A dashboard layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

impl DashboardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chart(mut self, chart: ChartSpec) -> Self {
        self.charts.push(chart);
        self
    }

    /// Parses a saved dashboard. A bare array of charts is accepted as well.
    pub fn from_json_str(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Saved {
            Wrapped(DashboardConfig),
            Bare(Vec<ChartSpec>),
        }

        Ok(match serde_json::from_str(json)? {
            Saved::Wrapped(config) => config,
            Saved::Bare(charts) => Self { charts },
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads a dashboard file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .config_context(format!("reading dashboard {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Writes the dashboard as pretty JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        tokio::fs::write(path, self.to_json_pretty()?).await?;
        info!(path = %path.display(), charts = self.charts.len(), "Saved dashboard");
        Ok(())
    }

    /// Renders every chart against `dataset`, in order.
    pub fn render_all(&self, dataset: &Dataset) -> Vec<RenderOutcome> {
        self.charts
            .iter()
            .map(|chart| dataset.render(&chart.selection))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::ChartType;
    use crate::metrics::Metric;

    fn dashboard() -> DashboardConfig {
        DashboardConfig::new()
            .with_chart(
                ChartSpec::new(
                    Selection::new(ChartType::Bar)
                        .group_by("nationality")
                        .metric(Metric::Count),
                )
                .with_title("Students by nationality"),
            )
            .with_chart(ChartSpec::new(
                Selection::new(ChartType::Line)
                    .group_by("intake_term")
                    .metric(Metric::average("age"))
                    .filter("visa_status", "Student"),
            ))
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&dashboard().to_json_pretty().unwrap()).unwrap();
        let first = &json["charts"][0];
        assert_eq!(first["type"], "bar");
        assert_eq!(first["group_field"], "nationality");
        assert_eq!(first["metric"], "__count__");
        assert_eq!(first["title"], "Students by nationality");
        assert_eq!(json["charts"][1]["filters"][0]["value"], "Student");
    }

    #[test]
    fn test_reads_bare_array_with_dashboard_keys() {
        let config = DashboardConfig::from_json_str(
            r#"[{"type": "doughnut", "xField": "campus_name", "yField": "__count_yes__study_english__",
                 "filters": [], "metricFilters": [{"metric": "__count__", "op": ">", "value": "5"}]}]"#,
        )
        .unwrap();
        let selection = &config.charts[0].selection;
        assert_eq!(selection.chart_type, ChartType::Doughnut);
        assert_eq!(selection.metric, Some(Metric::count_yes("study_english")));
        assert_eq!(selection.metric_filters[0].threshold, 5.0);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");

        let original = dashboard();
        original.save(&path).await.unwrap();
        let loaded = DashboardConfig::load(&path).await.unwrap();
        assert_eq!(loaded, original);

        assert!(DashboardConfig::load(dir.path().join("missing.json"))
            .await
            .is_err());
    }

    #[test]
    fn test_render_all() {
        let dataset = Dataset::from_raw_rows(
            crate::test_fixtures::enrollment_raw_rows(24),
            crate::config::EngineConfig::default(),
        );
        let outcomes = dashboard().render_all(&dataset);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_rendered());
        assert!(outcomes[1].is_rendered());
    }
}
