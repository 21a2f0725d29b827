//! Repository call results

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{CacheIndexRecord, Table};

/// Where the returned payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// Served from a cached artifact still within its TTL
    Fresh,
    /// Fetched from the connector and persisted during this call
    Refreshed,
    /// Served from a cached artifact without a successful live fetch
    Stale,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Refreshed => "refreshed",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata about the returned artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub rows: u64,
    pub ttl_days: u32,
    pub schema_version: Option<String>,
    pub as_of: Option<String>,
    /// Why a live fetch was abandoned in favour of the cached artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl From<&CacheIndexRecord> for ResultMetadata {
    fn from(record: &CacheIndexRecord) -> Self {
        Self {
            rows: record.row_count,
            ttl_days: record.ttl_days,
            schema_version: record.schema_version.clone(),
            as_of: record.as_of.clone(),
            fallback_reason: None,
        }
    }
}

/// Outcome of a successful `Repository::get`
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryResult {
    pub source_id: String,
    pub table: Table,
    pub status: FetchStatus,
    pub artifact_path: PathBuf,
    pub cache_key: String,
    pub correlation_id: String,
    pub metadata: ResultMetadata,
}

impl RepositoryResult {
    /// True when the payload came from the cache rather than a live fetch
    pub fn cache_hit(&self) -> bool {
        matches!(self.status, FetchStatus::Fresh | FetchStatus::Stale)
    }

    pub fn is_stale(&self) -> bool {
        self.status == FetchStatus::Stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: FetchStatus) -> RepositoryResult {
        RepositoryResult {
            source_id: "connector.a".to_string(),
            table: Table::default(),
            status,
            artifact_path: PathBuf::from("/cache/connector.a/k.json"),
            cache_key: "k".to_string(),
            correlation_id: "c".to_string(),
            metadata: ResultMetadata::default(),
        }
    }

    #[test]
    fn test_cache_hit_and_stale_flags() {
        assert!(result(FetchStatus::Fresh).cache_hit());
        assert!(!result(FetchStatus::Fresh).is_stale());

        assert!(!result(FetchStatus::Refreshed).cache_hit());
        assert!(!result(FetchStatus::Refreshed).is_stale());

        assert!(result(FetchStatus::Stale).cache_hit());
        assert!(result(FetchStatus::Stale).is_stale());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FetchStatus::Refreshed).unwrap(),
            "\"refreshed\""
        );
        assert_eq!(FetchStatus::Stale.to_string(), "stale");
    }
}
