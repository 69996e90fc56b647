//! Loading datasets and dashboards from disk.

mod common;

use cohort_guard::prelude::*;
use serde_json::json;

fn write_rows(dir: &std::path::Path, rows: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join("students.json");
    std::fs::write(&path, serde_json::to_vec(rows).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn test_load_dataset_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(dir.path(), &json!(common::enrollment_rows(24)));

    let source = JsonFileSource::new(&path);
    assert!(source.description().contains("students.json"));

    let dataset = Dataset::load(&source, EngineConfig::default()).await.unwrap();
    assert_eq!(dataset.len(), 24);
    assert_eq!(dataset.dropped_rows(), 0);
    assert_eq!(
        dataset.unique_values("nationality"),
        vec!["Chinese", "Indian", "Nepalese", "Vietnamese"]
    );
}

#[tokio::test]
async fn test_load_rejects_non_array_payload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(dir.path(), &json!({"rows": []}));

    let err = Dataset::load(&JsonFileSource::new(&path), EngineConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CohortError::InvalidPayload(_)));
}

#[tokio::test]
async fn test_missing_file_is_a_source_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Dataset::load(
        &JsonFileSource::new(dir.path().join("absent.json")),
        EngineConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CohortError::DataSource { .. }));
}

#[tokio::test]
async fn test_memory_source_matches_file_source() {
    let rows = json!(common::enrollment_rows(12));
    let dir = tempfile::tempdir().unwrap();
    let path = write_rows(dir.path(), &rows);

    let from_file = Dataset::load(&JsonFileSource::new(&path), EngineConfig::default())
        .await
        .unwrap();
    let from_memory = Dataset::load(
        &MemorySource::from_json(rows).unwrap(),
        EngineConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(from_file.rows(), from_memory.rows());
    assert_eq!(from_file.registry(), from_memory.registry());
}

#[tokio::test]
async fn test_dashboard_round_trip_and_render() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = write_rows(dir.path(), &json!(common::enrollment_rows(24)));
    let dataset = Dataset::load(&JsonFileSource::new(&data_path), EngineConfig::default())
        .await
        .unwrap();

    let dashboard = DashboardConfig::new()
        .with_chart(
            ChartSpec::new(
                Selection::new(ChartType::Doughnut)
                    .group_by("campus_name")
                    .metric(Metric::Count),
            )
            .with_title("Campus mix"),
        )
        .with_chart(ChartSpec::new(
            Selection::new(ChartType::Pie)
                .group_by("intake_term")
                .metric(Metric::Count),
        ));

    let dashboard_path = dir.path().join("dashboard.json");
    dashboard.save(&dashboard_path).await.unwrap();
    let loaded = DashboardConfig::load(&dashboard_path).await.unwrap();
    assert_eq!(loaded, dashboard);

    let outcomes = loaded.render_all(&dataset);
    assert!(outcomes[0].is_rendered());
    assert_eq!(
        outcomes[1].reason(),
        Some("Use bar/line for time on intake_term.")
    );
}

#[test]
fn test_engine_config_file_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.json");
    std::fs::write(
        &path,
        r#"{"guards": {"pie_max_categories": 2}, "metrics": {"mode": "generic"}}"#,
    )
    .unwrap();

    let config = EngineConfig::from_path(&path).unwrap();
    assert_eq!(config.guards.pie_max_categories, 2);
    assert_eq!(config.metrics.mode, EligibilityMode::Generic);

    let dataset =
        Dataset::from_json_value(json!(common::enrollment_rows(24)), config).unwrap();
    let outcome = dataset.check(
        &Selection::new(ChartType::Pie)
            .group_by("campus_name")
            .metric(Metric::Count),
    );
    assert_eq!(outcome.rule, Some(GuardRule::TooManyPieCategories));
}
