//! Flat enrollment records and the scalar helpers every other module reads
//! them through.
//!
//! A [`RawRow`] is one object exactly as the API returned it. Normalization
//! ([`normalize`]) rewrites its headers into canonical snake_case keys and
//! [`derive`] adds the computed intake and flag columns, yielding a
//! [`Record`]. Records are not mutated after that.

pub mod derive;
pub mod normalize;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use derive::{derive_domain_fields, normalize_yes_no, parse_date, validate_row, RowCheck};
pub use normalize::{snake_case, HeaderAliases};

/// One row as delivered by the API, keyed by its human-friendly headers.
pub type RawRow = Map<String, Value>;

/// Label used for rows whose grouping value is missing.
pub const UNKNOWN_GROUP: &str = "Unknown";

/// A normalized record: canonical column key to scalar value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Returns the value stored under `key`, if the column is present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Sets `key` to `value`, keeping the column's original position when it
    /// already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Whether the record has a column named `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Column keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Numeric value of `key`, see [`as_number`].
    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(as_number)
    }

    /// Grouping label of `key`, see [`group_label`].
    pub fn group_label(&self, key: &str) -> String {
        group_label(self.get(key))
    }

    /// String form of `key`, see [`display_value`].
    pub fn display(&self, key: &str) -> String {
        display_value(self.get(key))
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// True for `null` and for strings that are empty after trimming.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Parses a value as a finite number.
///
/// Numbers pass through, strings are trimmed and parsed. Blanks, booleans,
/// non-finite results and anything else yield `None`; callers filter these
/// out rather than treating them as zero.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

/// String form of a scalar as used for equality filters and "Yes" matching.
///
/// A missing or null value renders as `"null"`.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Group key for a value: missing and null collapse to [`UNKNOWN_GROUP`].
pub fn group_label(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => UNKNOWN_GROUP.to_string(),
        other => display_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_number() {
        assert_eq!(as_number(&json!(30)), Some(30.0));
        assert_eq!(as_number(&json!(" 24.5 ")), Some(24.5));
        assert_eq!(as_number(&json!("x")), None);
        assert_eq!(as_number(&json!("")), None);
        assert_eq!(as_number(&json!(null)), None);
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&json!("inf")), None);
        assert_eq!(as_number(&json!("NaN")), None);
    }

    #[test]
    fn test_group_label_sentinel() {
        assert_eq!(group_label(None), "Unknown");
        assert_eq!(group_label(Some(&json!(null))), "Unknown");
        assert_eq!(group_label(Some(&json!(""))), "");
        assert_eq!(group_label(Some(&json!(2024))), "2024");
        assert_eq!(group_label(Some(&json!(false))), "false");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(Some(&json!("Yes"))), "Yes");
        assert_eq!(display_value(Some(&json!(null))), "null");
        assert_eq!(display_value(None), "null");
        assert_eq!(display_value(Some(&json!(1.5))), "1.5");
    }

    #[test]
    fn test_record_keeps_column_order() {
        let mut record = Record::new();
        record.insert("studentid", json!("S1"));
        record.insert("age", json!(20));
        record.insert("nationality", json!("Indian"));
        record.insert("age", json!(21));

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["studentid", "age", "nationality"]);
        assert_eq!(record.number("age"), Some(21.0));
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("   ")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!("No")));
    }
}
