//! Prelude for commonly used types and traits in cohort-guard.

pub use crate::aggregation::{ChartData, ComparisonOp, FieldFilter, MetricFilter};
pub use crate::analyzers::ColumnType;
pub use crate::config::EngineConfig;
pub use crate::dashboard::{ChartSpec, DashboardConfig};
pub use crate::dataset::{Dataset, RenderOutcome, RenderedChart};
pub use crate::error::{CohortError, ErrorContext, Result};
pub use crate::guard::{ChartType, GuardConfig, GuardOutcome, GuardRule, Selection};
pub use crate::logging::LogConfig;
pub use crate::metrics::{EligibilityMode, Metric, MetricCatalog};
pub use crate::records::{RawRow, Record};
pub use crate::registry::{FieldRegistry, FieldRole, FieldRule};
pub use crate::sources::{DataSource, JsonFileSource, MemorySource};
pub use crate::summary::ChartSummary;
