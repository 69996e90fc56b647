use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use super::{parse_payload, DataSource};
use crate::error::{CohortError, Result};
use crate::records::RawRow;

/// An HTTP endpoint answering GET with a JSON array of rows.
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataSource for HttpSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RawRow>> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| CohortError::data_source_with(format!("GET {}", self.url), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CohortError::data_source(format!(
                "GET {} returned {status}",
                self.url
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| CohortError::data_source_with(format!("decoding {}", self.url), e))?;
        let rows = parse_payload(payload)?;
        info!(rows = rows.len(), "Fetched rows");
        Ok(rows)
    }

    fn description(&self) -> String {
        format!("HTTP {}", self.url)
    }
}
