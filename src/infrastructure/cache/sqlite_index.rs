//! SQLite-backed cache index shared by every process using a cache root

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use tracing::debug;

use crate::domain::cache::{CacheIndex, CacheIndexRecord};
use crate::domain::CacheError;

/// Default upper bound on pooled index connections
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS cache_index (
        source_id TEXT NOT NULL,
        key_hash TEXT NOT NULL,
        path TEXT NOT NULL,
        created_at TEXT NOT NULL,
        as_of TEXT,
        ttl_days INTEGER NOT NULL,
        rows INTEGER NOT NULL,
        schema_version TEXT,
        PRIMARY KEY (source_id, key_hash)
    )
"#;

const CREATE_SOURCE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_cache_source ON cache_index(source_id)";

const SELECT_COLUMNS: &str =
    "SELECT source_id, key_hash, path, created_at, as_of, ttl_days, rows, schema_version FROM cache_index";

/// SQLite index configuration
#[derive(Debug, Clone)]
pub struct SqliteIndexConfig {
    /// Database file, created when missing
    pub path: PathBuf,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long a connection waits on a lock held by another writer
    pub busy_timeout: Duration,
    /// Pooled connections are closed after this much idle time
    pub idle_timeout: Duration,
}

impl SqliteIndexConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Cache index stored in one SQLite file
///
/// Uses a small pool of short-lived WAL connections so several processes can
/// read and upsert concurrently.
#[derive(Debug, Clone)]
pub struct SqliteCacheIndex {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteCacheIndex {
    /// Opens the index at `path` with default settings
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::connect(&SqliteIndexConfig::new(path)).await
    }

    /// Opens the index, creating the file and schema when missing
    pub async fn connect(config: &SqliteIndexConfig) -> Result<Self, CacheError> {
        if let Some(parent) = config.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(format!("creating {}", parent.display()), e))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(0)
            .idle_timeout(config.idle_timeout)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::index(format!(
                    "Failed to open cache index {}: {}",
                    config.path.display(),
                    e
                ))
            })?;

        let index = Self {
            pool,
            path: config.path.clone(),
        };
        index.ensure_schema().await?;

        debug!(path = %index.path.display(), "Opened cache index");
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the index table if it does not exist yet
    async fn ensure_schema(&self) -> Result<(), CacheError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::index(format!("Failed to create cache index table: {}", e)))?;

        sqlx::query(CREATE_SOURCE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::index(format!("Failed to create source index: {}", e)))?;

        Ok(())
    }

    fn row_to_record(row: &SqliteRow) -> Result<CacheIndexRecord, CacheError> {
        let column_error = |e: sqlx::Error| CacheError::index(format!("Malformed index row: {}", e));

        let created_at: String = row.try_get("created_at").map_err(column_error)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| {
                CacheError::index(format!("Invalid created_at '{}': {}", created_at, e))
            })?
            .with_timezone(&Utc);
        let path: String = row.try_get("path").map_err(column_error)?;
        let ttl_days: i64 = row.try_get("ttl_days").map_err(column_error)?;
        let rows: i64 = row.try_get("rows").map_err(column_error)?;

        Ok(CacheIndexRecord {
            source_id: row.try_get("source_id").map_err(column_error)?,
            key_hash: row.try_get("key_hash").map_err(column_error)?,
            relative_path: PathBuf::from(path),
            created_at,
            as_of: row.try_get("as_of").map_err(column_error)?,
            ttl_days: u32::try_from(ttl_days.max(0)).unwrap_or(u32::MAX),
            row_count: u64::try_from(rows.max(0)).unwrap_or_default(),
            schema_version: row.try_get("schema_version").map_err(column_error)?,
        })
    }
}

#[async_trait]
impl CacheIndex for SqliteCacheIndex {
    async fn lookup(
        &self,
        source_id: &str,
        key_hash: &str,
    ) -> Result<Option<CacheIndexRecord>, CacheError> {
        let sql = format!("{} WHERE source_id = ? AND key_hash = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(source_id)
            .bind(key_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::index(format!("Failed to look up cache record: {}", e)))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn upsert(&self, record: &CacheIndexRecord) -> Result<(), CacheError> {
        let path = record.relative_path.to_string_lossy().replace('\\', "/");
        let created_at = record
            .created_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true);
        let rows = i64::try_from(record.row_count).unwrap_or(i64::MAX);

        sqlx::query(
            r#"
            INSERT INTO cache_index
                (source_id, key_hash, path, created_at, as_of, ttl_days, rows, schema_version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id, key_hash) DO UPDATE SET
                path = excluded.path,
                created_at = excluded.created_at,
                as_of = excluded.as_of,
                ttl_days = excluded.ttl_days,
                rows = excluded.rows,
                schema_version = excluded.schema_version
            "#,
        )
        .bind(&record.source_id)
        .bind(&record.key_hash)
        .bind(path)
        .bind(created_at)
        .bind(&record.as_of)
        .bind(i64::from(record.ttl_days))
        .bind(rows)
        .bind(&record.schema_version)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::index(format!("Failed to upsert cache record: {}", e)))?;

        Ok(())
    }

    async fn list(&self, source_id: Option<&str>) -> Result<Vec<CacheIndexRecord>, CacheError> {
        let rows = match source_id {
            Some(source_id) => {
                let sql = format!(
                    "{} WHERE source_id = ? ORDER BY source_id, created_at",
                    SELECT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(source_id)
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("{} ORDER BY source_id, created_at", SELECT_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(|e| CacheError::index(format!("Failed to list cache records: {}", e)))?;

        rows.iter().map(Self::row_to_record).collect()
    }
}
