//! Failure capture for diagnosing bad payloads and failed fetches

use std::fmt::Debug;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::error::CacheError;
use crate::domain::table::Table;

/// Timestamp format used for failure records and file names
pub const FAILURE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%6f";

/// Context persisted when a fetch fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp: String,
    pub source_id: String,
    pub correlation_id: String,
    pub message: String,
    pub cache_key: Option<String>,
    pub query_signature: Option<String>,
    pub error: Option<String>,
}

impl FailureRecord {
    pub fn new(
        source_id: impl Into<String>,
        correlation_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now().format(FAILURE_TIMESTAMP_FORMAT).to_string(),
            source_id: source_id.into(),
            correlation_id: correlation_id.into(),
            message: message.into(),
            cache_key: None,
            query_signature: None,
            error: None,
        }
    }

    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }

    pub fn with_query_signature(mut self, signature: impl Into<String>) -> Self {
        self.query_signature = Some(signature.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Destination for failure diagnostics
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FailureSink: Send + Sync + Debug {
    /// Persist a raw payload snapshot, returning where it was written
    async fn capture_payload(
        &self,
        source_id: &str,
        correlation_id: &str,
        table: &Table,
    ) -> Result<PathBuf, CacheError>;

    /// Persist a failure record, returning where it was written
    async fn record_failure(&self, record: &FailureRecord) -> Result<PathBuf, CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_record_builder() {
        let record = FailureRecord::new("connector.eia_v2", "abc", "schema failure")
            .with_cache_key("k1")
            .with_query_signature("{}")
            .with_error("missing column");

        assert_eq!(record.source_id, "connector.eia_v2");
        assert_eq!(record.cache_key.as_deref(), Some("k1"));
        assert_eq!(record.query_signature.as_deref(), Some("{}"));
        assert_eq!(record.error.as_deref(), Some("missing column"));
        assert_eq!(record.timestamp.len(), "20240101T000000000000".len());
    }
}
