//! Cache index record and freshness rules

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Metadata describing one cached artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheIndexRecord {
    pub source_id: String,
    pub key_hash: String,
    /// Artifact location relative to the cache root
    pub relative_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub as_of: Option<String>,
    /// Zero means the record is never fresh
    pub ttl_days: u32,
    pub row_count: u64,
    pub schema_version: Option<String>,
}

impl CacheIndexRecord {
    /// Instant after which the record is stale, `None` when `ttl_days` is zero
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.ttl_days == 0 {
            return None;
        }
        self.created_at
            .checked_add_signed(Duration::days(i64::from(self.ttl_days)))
    }

    /// Fresh iff `ttl_days > 0` and `reference <= created_at + ttl_days`
    pub fn is_fresh(&self, reference: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => reference <= expires_at,
            None => self.ttl_days > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ttl_days: u32) -> CacheIndexRecord {
        CacheIndexRecord {
            source_id: "connector.place_context".to_string(),
            key_hash: "k".repeat(64),
            relative_path: PathBuf::from("connector.place_context/k.json"),
            created_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            as_of: None,
            ttl_days,
            row_count: 1,
            schema_version: None,
        }
    }

    #[test]
    fn test_fresh_at_exact_boundary() {
        let record = record(3);
        let boundary = record.created_at + Duration::days(3);

        assert!(record.is_fresh(record.created_at));
        assert!(record.is_fresh(boundary));
        assert!(!record.is_fresh(boundary + Duration::nanoseconds(1)));
    }

    #[test]
    fn test_zero_ttl_never_fresh() {
        let record = record(0);

        assert_eq!(record.expires_at(), None);
        assert!(!record.is_fresh(record.created_at));
        assert!(!record.is_fresh(record.created_at - Duration::days(1)));
    }

    #[test]
    fn test_expires_at() {
        let record = record(7);

        assert_eq!(
            record.expires_at(),
            Some(record.created_at + Duration::days(7))
        );
    }
}
