//! Where raw rows come from.
//!
//! The engine consumes a JSON array of flat objects. A [`DataSource`] is
//! anything that can produce that array: rows already in memory, a file on
//! disk, or (with the `http` feature) an API endpoint.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::error::{CohortError, Result};
use crate::records::RawRow;

mod json;
mod memory;

#[cfg(feature = "http")]
mod http;

pub use json::JsonFileSource;
pub use memory::MemorySource;

#[cfg(feature = "http")]
pub use http::HttpSource;

/// A provider of raw API rows.
///
/// # Examples
///
/// ```rust
/// use cohort_guard::sources::{DataSource, MemorySource};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = MemorySource::from_json(json!([{"Nationality": "Indian"}])).unwrap();
/// let rows = source.fetch().await.unwrap();
/// assert_eq!(rows.len(), 1);
/// # }
/// ```
#[async_trait]
pub trait DataSource: Debug + Send + Sync {
    /// Fetches every row. Transport failures surface as
    /// [`CohortError::DataSource`].
    async fn fetch(&self) -> Result<Vec<RawRow>>;

    /// Returns a human-readable description of this data source.
    fn description(&self) -> String;
}

/// Splits a decoded payload into rows.
///
/// The payload must be an array whose elements are all objects.
pub fn parse_payload(payload: Value) -> Result<Vec<RawRow>> {
    let Value::Array(items) = payload else {
        return Err(CohortError::invalid_payload(format!(
            "expected a JSON array of rows, got {}",
            value_kind(&payload)
        )));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => Ok(row),
            other => Err(CohortError::invalid_payload(format!(
                "row {i} is {}, expected an object",
                value_kind(&other)
            ))),
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload() {
        let rows = parse_payload(json!([{"a": 1}, {"b": null}])).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(parse_payload(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_parse_payload_rejects_shapes() {
        let err = parse_payload(json!({"rows": []})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid payload: expected a JSON array of rows, got an object"
        );

        let err = parse_payload(json!([{"a": 1}, 5])).unwrap_err();
        assert!(err.to_string().contains("row 1 is a number"));
    }
}
