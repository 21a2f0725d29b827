//! Filesystem failure sink
//!
//! Layout: `<root>/<source_id>/<timestamp>-<cid>.payload.json` for payload
//! snapshots and `<root>/<source_id>/<timestamp>-<cid>.log` for failure records.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::domain::failure::{FailureRecord, FailureSink, FAILURE_TIMESTAMP_FORMAT};
use crate::domain::{CacheError, Table};
use crate::infrastructure::cache::paths::sanitize_segment;

const CORRELATION_PREFIX_LEN: usize = 8;

#[derive(Debug, Serialize)]
struct PayloadSnapshot<'a> {
    timestamp: &'a str,
    source_id: &'a str,
    correlation_id: &'a str,
    payload: &'a Table,
}

/// Writes failure diagnostics as pretty JSON files
#[derive(Debug, Clone)]
pub struct FsFailureSink {
    root: PathBuf,
}

impl FsFailureSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures and returns the directory holding diagnostics for a source
    pub async fn ensure_source_dir(&self, source_id: &str) -> Result<PathBuf, CacheError> {
        let dir = self.root.join(sanitize_segment(source_id));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(format!("creating {}", dir.display()), e))?;
        Ok(dir)
    }

    fn file_stem(timestamp: &str, correlation_id: &str) -> String {
        let prefix: String = correlation_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(CORRELATION_PREFIX_LEN)
            .collect();
        format!("{}-{}", timestamp, prefix)
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(value)
            .map_err(|e| CacheError::serialization(format!("Failed to encode failure: {}", e)))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| CacheError::io(format!("writing {}", path.display()), e))
    }
}

#[async_trait]
impl FailureSink for FsFailureSink {
    async fn capture_payload(
        &self,
        source_id: &str,
        correlation_id: &str,
        table: &Table,
    ) -> Result<PathBuf, CacheError> {
        let dir = self.ensure_source_dir(source_id).await?;
        let timestamp = Utc::now().format(FAILURE_TIMESTAMP_FORMAT).to_string();
        let path = dir.join(format!(
            "{}.payload.json",
            Self::file_stem(&timestamp, correlation_id)
        ));

        let snapshot = PayloadSnapshot {
            timestamp: &timestamp,
            source_id,
            correlation_id,
            payload: table,
        };
        Self::write_json(&path, &snapshot).await?;
        Ok(path)
    }

    async fn record_failure(&self, record: &FailureRecord) -> Result<PathBuf, CacheError> {
        let dir = self.ensure_source_dir(&record.source_id).await?;
        let path = dir.join(format!(
            "{}.log",
            Self::file_stem(&record.timestamp, &record.correlation_id)
        ));

        Self::write_json(&path, record).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_source_dir() {
        let dir = TempDir::new().unwrap();
        let sink = FsFailureSink::new(dir.path().join("failures"));

        let source_dir = sink.ensure_source_dir("connector.eia_v2").await.unwrap();

        assert!(source_dir.is_dir());
        assert_eq!(source_dir, dir.path().join("failures").join("connector.eia_v2"));
    }

    #[tokio::test]
    async fn test_capture_payload_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let sink = FsFailureSink::new(dir.path());
        let table = Table::new(["metric"]).with_row(
            json!({"metric": "jobs"}).as_object().cloned().unwrap(),
        );

        let path = sink
            .capture_payload("connector.eia_v2", "0123456789abcdef", &table)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-01234567.payload.json"));

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["correlation_id"], "0123456789abcdef");
        assert_eq!(written["source_id"], "connector.eia_v2");
        assert_eq!(written["payload"]["rows"][0]["metric"], "jobs");
    }

    #[tokio::test]
    async fn test_record_failure_writes_log() {
        let dir = TempDir::new().unwrap();
        let sink = FsFailureSink::new(dir.path());
        let record = FailureRecord::new("connector.bls", "cid-1", "upstream 503")
            .with_cache_key("k1")
            .with_error("Connector error for 'connector.bls': upstream 503");

        let path = sink.record_failure(&record).await.unwrap();

        assert_eq!(path.extension().unwrap(), "log");
        assert!(path.starts_with(dir.path().join("connector.bls")));
        let written: FailureRecord =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, record);
    }
}
