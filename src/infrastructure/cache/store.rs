//! Artifact store: payload files plus their index records

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::paths;
use super::sqlite_index::{SqliteCacheIndex, SqliteIndexConfig, DEFAULT_MAX_CONNECTIONS};
use crate::domain::cache::{CacheIndex, CacheIndexRecord};
use crate::domain::{CacheError, Table};

/// Payload files under a cache root, indexed by a [`CacheIndex`]
///
/// Writes replace artifacts by atomic rename so readers never see a partial
/// file, and the index only advances together with the artifact.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    index: Arc<dyn CacheIndex>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, index: Arc<dyn CacheIndex>) -> Self {
        Self {
            root: root.into(),
            index,
        }
    }

    /// Opens a store with its SQLite index at `<root>/cache_index.sqlite`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::open_with(root, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Like [`CacheStore::open`] with an explicit index pool size
    pub async fn open_with(
        root: impl Into<PathBuf>,
        max_connections: u32,
    ) -> Result<Self, CacheError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::io(format!("creating cache root {}", root.display()), e))?;

        let config =
            SqliteIndexConfig::new(paths::index_path(&root)).with_max_connections(max_connections);
        let index = SqliteCacheIndex::connect(&config).await?;

        Ok(Self::new(root, Arc::new(index)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &dyn CacheIndex {
        self.index.as_ref()
    }

    pub fn artifact_path(&self, source_id: &str, key_hash: &str) -> PathBuf {
        paths::artifact_path(&self.root, source_id, key_hash)
    }

    pub fn lock_path(&self, source_id: &str) -> PathBuf {
        paths::lock_path(&self.root, source_id)
    }

    /// Absolute artifact path for a record
    pub fn resolve(&self, record: &CacheIndexRecord) -> PathBuf {
        self.root.join(&record.relative_path)
    }

    pub async fn lookup(
        &self,
        source_id: &str,
        key_hash: &str,
    ) -> Result<Option<CacheIndexRecord>, CacheError> {
        self.index.lookup(source_id, key_hash).await
    }

    pub async fn list(&self, source_id: Option<&str>) -> Result<Vec<CacheIndexRecord>, CacheError> {
        self.index.list(source_id).await
    }

    /// Reads the artifact a record points at
    pub async fn load(&self, record: &CacheIndexRecord) -> Result<Table, CacheError> {
        let path = self.resolve(record);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CacheError::ArtifactMissing {
                    source_id: record.source_id.clone(),
                    path,
                });
            }
            Err(e) => return Err(CacheError::io(format!("reading {}", path.display()), e)),
        };

        serde_json::from_slice(&bytes).map_err(|e| CacheError::ArtifactCorrupt {
            path,
            message: e.to_string(),
        })
    }

    /// Persists a payload and upserts its index record
    ///
    /// On index failure the previous artifact, if any, is put back.
    pub async fn write(
        &self,
        source_id: &str,
        key_hash: &str,
        table: &Table,
        ttl_days: u32,
        schema_version: Option<&str>,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<CacheIndexRecord, CacheError> {
        let relative_path = paths::relative_artifact_path(source_id, key_hash);
        let artifact = self.root.join(&relative_path);
        let dir = paths::source_dir(&self.root, source_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(format!("creating {}", dir.display()), e))?;

        let bytes = serde_json::to_vec(table).map_err(|e| {
            CacheError::serialization(format!("Failed to encode payload for '{}': {}", source_id, e))
        })?;

        let temp = dir.join(format!(".{}.{}.tmp", key_hash, Uuid::new_v4().simple()));
        if let Err(e) = write_synced(&temp, &bytes).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        let backup = dir.join(format!(".{}.{}.bak", key_hash, Uuid::new_v4().simple()));
        let has_backup = match tokio::fs::copy(&artifact, &backup).await {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                return Err(CacheError::io(format!("backing up {}", artifact.display()), e));
            }
        };

        if let Err(e) = tokio::fs::rename(&temp, &artifact).await {
            let _ = tokio::fs::remove_file(&temp).await;
            discard(&backup, has_backup).await;
            return Err(CacheError::io(format!("replacing {}", artifact.display()), e));
        }

        let record = CacheIndexRecord {
            source_id: source_id.to_string(),
            key_hash: key_hash.to_string(),
            relative_path,
            created_at: created_at.unwrap_or_else(Utc::now),
            as_of: table.as_of(),
            ttl_days,
            row_count: table.row_count() as u64,
            schema_version: schema_version.map(str::to_string),
        };

        if let Err(e) = self.index.upsert(&record).await {
            self.restore(&artifact, &backup, has_backup).await;
            return Err(e);
        }

        discard(&backup, has_backup).await;
        debug!(
            source_id = %source_id,
            key_hash = %key_hash,
            rows = record.row_count,
            artifact = %artifact.display(),
            "Wrote cache artifact"
        );
        Ok(record)
    }

    async fn restore(&self, artifact: &Path, backup: &Path, has_backup: bool) {
        let outcome = if has_backup {
            tokio::fs::rename(backup, artifact).await
        } else {
            tokio::fs::remove_file(artifact).await
        };

        if let Err(e) = outcome {
            warn!(
                artifact = %artifact.display(),
                error = %e,
                "Failed to roll back cache artifact"
            );
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let context = || format!("writing {}", path.display());
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| CacheError::io(context(), e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| CacheError::io(context(), e))?;
    file.sync_all()
        .await
        .map_err(|e| CacheError::io(context(), e))?;
    Ok(())
}

async fn discard(backup: &Path, has_backup: bool) {
    if has_backup {
        let _ = tokio::fs::remove_file(backup).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCacheIndex;
    use crate::domain::table::Row;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn sample_table(rows: usize) -> Table {
        let mut table = Table::new(["place_id", "metric", "value", "observed_at", "source_id"]);
        for i in 0..rows {
            table.push_row(row(json!({
                "place_id": format!("p-{:03}", i),
                "metric": "jobs",
                "value": i as f64 * 1.5,
                "observed_at": "2024-01-01",
                "source_id": "connector.place_context"
            })));
        }
        table
    }

    fn memory_store(dir: &TempDir) -> (CacheStore, Arc<MockCacheIndex>) {
        let index = Arc::new(MockCacheIndex::new());
        (CacheStore::new(dir.path(), index.clone()), index)
    }

    fn leftover_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp") || name.ends_with(".bak"))
            .collect()
    }

    #[tokio::test]
    async fn test_round_trip_zero_one_and_many_rows() {
        let dir = TempDir::new().unwrap();
        let (store, _) = memory_store(&dir);

        for (i, rows) in [0usize, 1, 25].into_iter().enumerate() {
            let table = sample_table(rows);
            let key = format!("key{}", i);

            let record = store
                .write("connector.place_context", &key, &table, 1, None, None)
                .await
                .unwrap();

            assert_eq!(record.row_count, rows as u64);
            assert_eq!(store.load(&record).await.unwrap(), table);
        }
    }

    #[tokio::test]
    async fn test_write_records_metadata() {
        let dir = TempDir::new().unwrap();
        let (store, index) = memory_store(&dir);
        let created_at = Utc::now();

        let record = store
            .write(
                "connector.place_context",
                "abc",
                &sample_table(2),
                7,
                Some("v2"),
                Some(created_at),
            )
            .await
            .unwrap();

        assert_eq!(record.ttl_days, 7);
        assert_eq!(record.schema_version.as_deref(), Some("v2"));
        assert_eq!(record.as_of.as_deref(), Some("2024-01-01"));
        assert_eq!(record.created_at, created_at);
        assert_eq!(
            store.resolve(&record),
            dir.path().join("connector.place_context").join("abc.json")
        );
        assert_eq!(store.resolve(&record), store.artifact_path("connector.place_context", "abc"));
        assert_eq!(
            index.lookup("connector.place_context", "abc").await.unwrap(),
            Some(record)
        );
    }

    #[tokio::test]
    async fn test_rewrite_replaces_artifact_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let (store, index) = memory_store(&dir);

        store
            .write("connector.a", "k", &sample_table(1), 1, None, None)
            .await
            .unwrap();
        let record = store
            .write("connector.a", "k", &sample_table(3), 1, None, None)
            .await
            .unwrap();

        assert_eq!(store.load(&record).await.unwrap().row_count(), 3);
        assert_eq!(index.len(), 1);
        assert!(leftover_files(&dir.path().join("connector.a")).is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let (store, _) = memory_store(&dir);
        let record = store
            .write("connector.a", "k", &sample_table(1), 1, None, None)
            .await
            .unwrap();

        std::fs::remove_file(store.resolve(&record)).unwrap();

        let result = store.load(&record).await;
        assert!(matches!(result, Err(CacheError::ArtifactMissing { .. })));
    }

    #[tokio::test]
    async fn test_load_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let (store, _) = memory_store(&dir);
        let record = store
            .write("connector.a", "k", &sample_table(1), 1, None, None)
            .await
            .unwrap();

        std::fs::write(store.resolve(&record), b"{not json").unwrap();

        let result = store.load(&record).await;
        assert!(matches!(result, Err(CacheError::ArtifactCorrupt { .. })));
    }

    #[tokio::test]
    async fn test_failed_upsert_restores_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let (store, _) = memory_store(&dir);
        let original = sample_table(2);
        let record = store
            .write("connector.a", "k", &original, 1, None, None)
            .await
            .unwrap();

        let failing = CacheStore::new(
            dir.path(),
            Arc::new(MockCacheIndex::new().with_upsert_error("disk full")),
        );
        let result = failing
            .write("connector.a", "k", &sample_table(5), 1, None, None)
            .await;

        assert!(matches!(result, Err(CacheError::Index { .. })));
        assert_eq!(store.load(&record).await.unwrap(), original);
        assert!(leftover_files(&dir.path().join("connector.a")).is_empty());
    }

    #[tokio::test]
    async fn test_failed_first_upsert_leaves_no_artifact() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(
            dir.path(),
            Arc::new(MockCacheIndex::new().with_upsert_error("disk full")),
        );

        let result = store
            .write("connector.a", "k", &sample_table(1), 1, None, None)
            .await;

        assert!(result.is_err());
        assert!(!store.artifact_path("connector.a", "k").exists());
    }

    #[tokio::test]
    async fn test_open_creates_sqlite_index() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("cache");

        let store = CacheStore::open(&root).await.unwrap();
        let record = store
            .write("connector.a", "k", &sample_table(1), 1, None, None)
            .await
            .unwrap();

        assert!(root.join("cache_index.sqlite").exists());
        assert_eq!(store.lookup("connector.a", "k").await.unwrap(), Some(record));
        assert_eq!(store.list(Some("connector.a")).await.unwrap().len(), 1);
    }
}
