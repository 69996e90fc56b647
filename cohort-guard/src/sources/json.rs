use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{parse_payload, DataSource};
use crate::error::{CohortError, ErrorContext, Result};
use crate::records::RawRow;

/// A JSON file holding the API response verbatim.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn fetch(&self) -> Result<Vec<RawRow>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .source_context(format!("reading {}", self.path.display()))?;
        let payload = serde_json::from_slice(&bytes).map_err(|e| {
            CohortError::data_source_with(format!("decoding {}", self.path.display()), e)
        })?;
        let rows = parse_payload(payload)?;
        debug!(rows = rows.len(), "Read rows from file");
        Ok(rows)
    }

    fn description(&self) -> String {
        format!("JSON file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"StudentId": "S1"}}, {{"StudentId": "S2"}}]"#).unwrap();

        let source = JsonFileSource::new(file.path());
        let rows = source.fetch().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(source.description().starts_with("JSON file "));
    }

    #[tokio::test]
    async fn test_missing_file_is_data_source_error() {
        let source = JsonFileSource::new("/nonexistent/rows.json");
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, CohortError::DataSource { .. }));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{{").unwrap();
        let err = JsonFileSource::new(file.path()).fetch().await.unwrap_err();
        assert!(matches!(err, CohortError::DataSource { .. }));
    }
}
