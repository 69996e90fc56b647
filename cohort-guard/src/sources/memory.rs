use async_trait::async_trait;
use serde_json::Value;

use super::{parse_payload, DataSource};
use crate::error::Result;
use crate::records::RawRow;

/// Rows already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: Vec<RawRow>,
}

impl MemorySource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }

    /// Builds a source from a decoded JSON array.
    pub fn from_json(payload: Value) -> Result<Self> {
        Ok(Self::new(parse_payload(payload)?))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl DataSource for MemorySource {
    async fn fetch(&self) -> Result<Vec<RawRow>> {
        Ok(self.rows.clone())
    }

    fn description(&self) -> String {
        format!("in-memory rows ({})", self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemorySource::from_json(json!([{"Age": 20}, {"Age": 21}])).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.description(), "in-memory rows (2)");

        let rows = source.fetch().await.unwrap();
        assert_eq!(rows[1].get("Age"), Some(&json!(21)));
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(MemorySource::from_json(json!("rows")).is_err());
    }
}
