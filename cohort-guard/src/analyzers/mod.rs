//! Dataset analyzers run once per load.
//!
//! - **Type inference** (`inference`): classifies each column as numeric,
//!   date, boolean or categorical from a sample of rows.
//! - **Mutex inference** (`mutex`): finds column pairs that encode the same
//!   attribute, such as a course code and a course name.
//!
//! Both are pure functions of the loaded rows; their output feeds the
//! [`FieldRegistry`](crate::registry::FieldRegistry) and the
//! [`SelectionGuard`](crate::guard::SelectionGuard).

pub mod inference;
pub mod mutex;

pub use inference::{ColumnType, InferenceConfig, TypeHints, TypeInferenceEngine};
pub use mutex::{MutexConfig, MutexPairs};
