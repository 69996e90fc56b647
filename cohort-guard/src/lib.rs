//! # Cohort Guard - guarded charts over enrollment records
//!
//! Cohort Guard turns a flat list of student enrollment rows into data a
//! dashboard can chart safely. It infers a type for every column, builds a
//! field registry describing how each column may be used, and refuses chart
//! selections that would be misleading before anything is aggregated.
//!
//! ## Quick Start
//!
//! ```rust
//! use cohort_guard::prelude::*;
//! use serde_json::json;
//!
//! let rows: Vec<_> = (0..12)
//!     .map(|i| {
//!         json!({
//!             "StudentId": format!("S{i}"),
//!             "Campus_Name": if i % 2 == 0 { "Sydney" } else { "Melbourne" },
//!             "Age": 20 + i,
//!         })
//!     })
//!     .collect();
//!
//! let dataset = Dataset::from_json_value(json!(rows), EngineConfig::default()).unwrap();
//! let outcome = dataset.render(
//!     &Selection::new(ChartType::Bar)
//!         .group_by("campus_name")
//!         .metric(Metric::Count),
//! );
//! let chart = outcome.into_chart().unwrap();
//! assert_eq!(chart.chart.series, vec![6.0, 6.0]);
//! ```
//!
//! ## Architecture
//!
//! - **`records`**: header normalization and derived intake/flag columns
//! - **`analyzers`**: column type inference and mutex pair detection
//! - **`registry`**: per-field rules (roles, labels, axis eligibility)
//! - **`metrics`**: metric keys and the per-field eligibility catalog
//! - **`guard`**: the ordered checks a chart selection must pass
//! - **`aggregation`**: grouping, series computation and filters
//! - **`summary`**: plain-language highlights for a rendered chart
//! - **`sources`**: where rows come from (memory, JSON file, HTTP)
//! - **`dataset`**: the loaded façade tying the above together
//! - **`dashboard`**: saved chart layouts
//!
//! Logging goes through `tracing`; see [`logging`] for the knobs that keep
//! per-field output quiet on large datasets.

pub mod aggregation;
pub mod analyzers;
pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod guard;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod records;
pub mod registry;
pub mod sources;
pub mod summary;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

pub use dataset::{Dataset, RenderOutcome, RenderedChart};
pub use error::{CohortError, Result};
