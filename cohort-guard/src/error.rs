//! Error types for cohort-guard.
//!
//! Only boundary operations fail with an error: reading a dataset, decoding
//! JSON, loading configuration. Selection problems are reported through
//! [`GuardOutcome`](crate::guard::GuardOutcome) and malformed values are
//! coerced, so neither ever surfaces here.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, CohortError>;

/// Errors that can occur while loading or configuring a dataset.
#[derive(Error, Debug)]
pub enum CohortError {
    /// The data source could not produce rows.
    #[error("Data source error: {message}")]
    DataSource {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The payload was not a JSON array of flat objects.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal state.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CohortError {
    /// Creates a data source error with the given message.
    pub fn data_source(msg: impl Into<String>) -> Self {
        Self::DataSource {
            message: msg.into(),
            source: None,
        }
    }

    /// Creates a data source error wrapping an underlying cause.
    pub fn data_source_with(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DataSource {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid payload error with the given message.
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Attaches a human-readable context to foreign errors.
pub trait ErrorContext<T> {
    /// Wraps the error as a [`CohortError::DataSource`] with `context` as message.
    fn source_context(self, context: impl Into<String>) -> Result<T>;

    /// Wraps the error as a [`CohortError::Configuration`].
    fn config_context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn source_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CohortError::data_source_with(context, e))
    }

    fn config_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CohortError::configuration(format!("{}: {e}", context.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CohortError::data_source("endpoint unreachable");
        assert_eq!(err.to_string(), "Data source error: endpoint unreachable");

        let err = CohortError::configuration("min_sample_size must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: min_sample_size must be positive"
        );
    }

    #[test]
    fn test_source_context_keeps_cause() {
        let io: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "rows.json",
        ));
        let err = io.source_context("reading dataset").unwrap_err();
        match err {
            CohortError::DataSource { message, source } => {
                assert_eq!(message, "reading dataset");
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_serde_error_conversion() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: CohortError = parsed.unwrap_err().into();
        assert!(matches!(err, CohortError::Serialization(_)));
    }
}
