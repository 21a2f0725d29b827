//! Read-through dataset repository
//!
//! `get` resolves a dataset from the cache or its connector following the
//! freshness and fallback rules:
//!
//! - offline: serve the cached artifact as stale, or fail without fetching;
//! - fresh record with its artifact on disk: serve it as fresh; a missing or
//!   unreadable artifact forces a refetch without fallback;
//! - otherwise fetch, validate and persist under the source lock (refreshed);
//! - connector failures fall back to the prior artifact (stale) when there is
//!   one, schema failures never do.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use super::events::{self, CallContext};
use super::result::{FetchStatus, RepositoryResult, ResultMetadata};
use crate::config::CacheSettings;
use crate::domain::correlation::{current_correlation_id, new_correlation_id, with_correlation};
use crate::domain::{
    CacheError, CacheIndexRecord, CacheKey, Clock, Connector, ConnectorRegistry, FailureRecord,
    FailureSink, FetchError, Query, SchemaValidator, SourceLock, SystemClock, Table,
};
use crate::infrastructure::cache::CacheStore;
use crate::infrastructure::failure::FsFailureSink;
use crate::infrastructure::lock::FileSourceLock;
use crate::infrastructure::validation::RequiredColumnsValidator;

/// Columns of which a connector payload must carry at least one
const SHAPE_COLUMNS: [&str; 2] = ["source_id", "observed_at"];

/// Failure directory used when the builder is given no failure sink
const DEFAULT_FAILURE_DIR: &str = ".failures";

/// Payload rejected on structural grounds
struct SchemaRejection {
    message: String,
    missing: Vec<String>,
    payload: Option<Table>,
}

/// Read-through cache in front of a set of connectors
///
/// Cheap to clone and safe to share across tasks; several processes may use
/// the same cache root concurrently.
#[derive(Debug, Clone)]
pub struct Repository {
    store: CacheStore,
    registry: Arc<ConnectorRegistry>,
    validator: Arc<dyn SchemaValidator>,
    failures: Arc<dyn FailureSink>,
    lock: Arc<dyn SourceLock>,
    clock: Arc<dyn Clock>,
    offline: bool,
}

/// Builder for [`Repository`]
#[derive(Debug)]
pub struct RepositoryBuilder {
    store: CacheStore,
    registry: Arc<ConnectorRegistry>,
    validator: Option<Arc<dyn SchemaValidator>>,
    failures: Option<Arc<dyn FailureSink>>,
    lock: Option<Arc<dyn SourceLock>>,
    clock: Option<Arc<dyn Clock>>,
    offline: bool,
}

impl RepositoryBuilder {
    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.failures = Some(sink);
        self
    }

    pub fn source_lock(mut self, lock: Arc<dyn SourceLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Never call connectors; serve cached artifacts only
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn build(self) -> Repository {
        let root = self.store.root().to_path_buf();
        Repository {
            validator: self
                .validator
                .unwrap_or_else(|| Arc::new(RequiredColumnsValidator::new())),
            failures: self
                .failures
                .unwrap_or_else(|| Arc::new(FsFailureSink::new(root.join(DEFAULT_FAILURE_DIR)))),
            lock: self
                .lock
                .unwrap_or_else(|| Arc::new(FileSourceLock::new(&root))),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            store: self.store,
            registry: self.registry,
            offline: self.offline,
        }
    }
}

impl Repository {
    pub fn builder(store: CacheStore, registry: impl Into<Arc<ConnectorRegistry>>) -> RepositoryBuilder {
        RepositoryBuilder {
            store,
            registry: registry.into(),
            validator: None,
            failures: None,
            lock: None,
            clock: None,
            offline: false,
        }
    }

    /// Wires the SQLite index, file store, file lock and failure sink from settings
    pub async fn open(
        settings: &CacheSettings,
        registry: impl Into<Arc<ConnectorRegistry>>,
    ) -> Result<Self, CacheError> {
        let store = CacheStore::open_with(&settings.root, settings.index_max_connections).await?;
        let lock = FileSourceLock::new(&settings.root)
            .with_timeout(settings.lock_timeout())
            .with_poll_interval(settings.lock_poll_interval());

        Ok(Self::builder(store, registry)
            .failure_sink(Arc::new(FsFailureSink::new(&settings.failure_root)))
            .source_lock(Arc::new(lock))
            .offline(settings.offline)
            .build())
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Resolves a dataset for `source_id` and `query`
    ///
    /// Runs inside a correlation scope, inheriting the caller's id when there
    /// is one; the id is echoed on the result and on every log event.
    pub async fn get(&self, source_id: &str, query: &Query) -> Result<RepositoryResult, CacheError> {
        let correlation_id = current_correlation_id().unwrap_or_else(new_correlation_id);
        let span = tracing::info_span!(
            "repository.get",
            source_id = %source_id,
            correlation_id = %correlation_id
        );

        with_correlation(
            Some(correlation_id.clone()),
            self.get_in_scope(source_id, query, correlation_id),
        )
        .instrument(span)
        .await
    }

    /// Resolves each query in order, stopping at the first failure
    ///
    /// Warms the cache for a batch of queries; every call goes through
    /// [`Repository::get`] and so gets its own correlation id unless the
    /// caller already set one.
    pub async fn refresh(
        &self,
        source_id: &str,
        queries: &[Query],
    ) -> Result<Vec<RepositoryResult>, CacheError> {
        let mut results = Vec::with_capacity(queries.len());
        for query in queries {
            results.push(self.get(source_id, query).await?);
        }
        Ok(results)
    }

    async fn get_in_scope(
        &self,
        source_id: &str,
        query: &Query,
        correlation_id: String,
    ) -> Result<RepositoryResult, CacheError> {
        let started = Instant::now();
        let connector = match self.registry.resolve(source_id) {
            Ok(connector) => connector,
            Err(e) => {
                events::unknown_source(source_id, &correlation_id, &e, started.elapsed());
                return Err(e);
            }
        };

        let key = CacheKey::derive(source_id, query);
        let ctx = CallContext::new(source_id, &key, &correlation_id);
        events::start(&ctx, self.offline);

        let record = self
            .store
            .lookup(source_id, &key.hash)
            .await
            .map_err(|e| self.fail(&ctx, "fetch.index-error", e))?;
        let now = self.clock.now();

        if self.offline {
            return self.serve_offline(&ctx, record).await;
        }

        if let Some(record) = record.as_ref().filter(|r| r.is_fresh(now)) {
            match self.store.load(record).await {
                Ok(table) => {
                    let table = self.validate_cached(&ctx, table)?;
                    let result = self.result(&ctx, table, FetchStatus::Fresh, record, None);
                    events::served(&ctx, "fetch.cache-hit", result.status, &result.artifact_path);
                    return Ok(result);
                }
                Err(e @ (CacheError::ArtifactMissing { .. } | CacheError::ArtifactCorrupt { .. })) => {
                    let event = match &e {
                        CacheError::ArtifactMissing { .. } => "fetch.artifact-missing",
                        _ => "fetch.artifact-corrupt",
                    };
                    events::anomaly(&ctx, event, &e);
                    return self
                        .fetch_and_persist(&ctx, connector.as_ref(), query, None)
                        .await;
                }
                Err(e) => return Err(self.fail(&ctx, "fetch.cache-error", e)),
            }
        }

        self.fetch_and_persist(&ctx, connector.as_ref(), query, record)
            .await
    }

    async fn serve_offline(
        &self,
        ctx: &CallContext<'_>,
        record: Option<CacheIndexRecord>,
    ) -> Result<RepositoryResult, CacheError> {
        let Some(record) = record else {
            let e = CacheError::offline_miss(ctx.source_id, ctx.key.hash.clone());
            return Err(self.fail(ctx, "fetch.offline-miss", e));
        };

        let table = self
            .store
            .load(&record)
            .await
            .map_err(|e| self.fail(ctx, "fetch.offline-error", e))?;
        let table = self.validate_cached(ctx, table)?;

        let result = self.result(ctx, table, FetchStatus::Stale, &record, None);
        events::served(ctx, "fetch.offline-cache", result.status, &result.artifact_path);
        Ok(result)
    }

    /// Live fetch, validation and persistence, with fallback to `prior`
    async fn fetch_and_persist(
        &self,
        ctx: &CallContext<'_>,
        connector: &dyn Connector,
        query: &Query,
        prior: Option<CacheIndexRecord>,
    ) -> Result<RepositoryResult, CacheError> {
        events::step(ctx, "fetch.connector.request");

        let table = match connector.fetch(query).await {
            Ok(payload) => match self.check_payload(ctx.source_id, payload) {
                Ok(table) => table,
                Err(rejection) => return Err(self.reject(ctx, rejection).await),
            },
            Err(FetchError::Schema { message, payload }) => {
                let rejection = SchemaRejection {
                    message,
                    missing: Vec::new(),
                    payload,
                };
                return Err(self.reject(ctx, rejection).await);
            }
            Err(FetchError::Transient(message)) => {
                return self.recover(ctx, prior, message, false).await;
            }
            Err(FetchError::Unexpected(message)) => {
                let message = format!("Connector raised an unexpected error: {}", message);
                return self.recover(ctx, prior, message, true).await;
            }
        };

        let record = {
            let _guard = self
                .lock
                .acquire(ctx.source_id)
                .await
                .map_err(|e| self.fail(ctx, "fetch.lock-error", e))?;

            self.store
                .write(
                    ctx.source_id,
                    &ctx.key.hash,
                    &table,
                    connector.ttl_days(),
                    connector.schema_version(),
                    Some(self.clock.now()),
                )
                .await
                .map_err(|e| self.fail(ctx, "fetch.persist-error", e))?
        };

        let result = self.result(ctx, table, FetchStatus::Refreshed, &record, None);
        events::served(ctx, "fetch.connector-success", result.status, &result.artifact_path);
        Ok(result)
    }

    /// Shape check then strict validation of a fresh connector payload
    fn check_payload(&self, source_id: &str, payload: Table) -> Result<Table, SchemaRejection> {
        if !SHAPE_COLUMNS.iter().any(|column| payload.has_column(column)) {
            return Err(SchemaRejection {
                message: format!(
                    "payload must include a '{}' or '{}' column",
                    SHAPE_COLUMNS[0], SHAPE_COLUMNS[1]
                ),
                missing: SHAPE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                payload: Some(payload),
            });
        }

        self.validator
            .validate(source_id, payload.clone(), false)
            .map_err(|violation| SchemaRejection {
                message: violation.message,
                missing: violation.missing,
                payload: Some(payload),
            })
    }

    /// Lazy validation of a cached artifact before it is served
    fn validate_cached(&self, ctx: &CallContext<'_>, table: Table) -> Result<Table, CacheError> {
        self.validator
            .validate(ctx.source_id, table, true)
            .map_err(|violation| {
                let e = CacheError::schema(ctx.source_id, violation.message, violation.missing);
                self.fail(ctx, "fetch.cached-schema-error", e)
            })
    }

    /// Captures a schema failure and builds the error to propagate
    async fn reject(&self, ctx: &CallContext<'_>, rejection: SchemaRejection) -> CacheError {
        if let Some(payload) = &rejection.payload {
            if let Err(e) = self
                .failures
                .capture_payload(ctx.source_id, ctx.correlation_id, payload)
                .await
            {
                events::anomaly(ctx, "fetch.capture-error", &e);
            }
        }

        let e = CacheError::schema(ctx.source_id, rejection.message, rejection.missing);
        self.capture_failure(ctx, "Connector schema validation failed", &e)
            .await;
        self.fail(ctx, "fetch.schema-error", e)
    }

    /// Falls back to the prior artifact after a connector failure
    async fn recover(
        &self,
        ctx: &CallContext<'_>,
        prior: Option<CacheIndexRecord>,
        message: String,
        unexpected: bool,
    ) -> Result<RepositoryResult, CacheError> {
        let e = CacheError::connector(ctx.source_id, message);
        self.capture_failure(ctx, "Connector fetch failed", &e).await;

        let Some(record) = prior else {
            let event = if unexpected {
                "fetch.unexpected-error"
            } else {
                "fetch.connector-error"
            };
            return Err(self.fail(ctx, event, e));
        };

        let table = self
            .store
            .load(&record)
            .await
            .map_err(|load_error| self.fail(ctx, "fetch.fallback-unavailable", load_error))?;
        let table = self.validate_cached(ctx, table)?;

        let reason = e.to_string();
        let result = self.result(ctx, table, FetchStatus::Stale, &record, Some(reason.clone()));
        let event = if unexpected {
            "fetch.fallback-unexpected"
        } else {
            "fetch.fallback"
        };
        events::fell_back(ctx, event, &result.artifact_path, &reason);
        Ok(result)
    }

    async fn capture_failure(&self, ctx: &CallContext<'_>, message: &str, error: &CacheError) {
        let record = FailureRecord::new(ctx.source_id, ctx.correlation_id, message)
            .with_cache_key(ctx.key.hash.clone())
            .with_query_signature(ctx.key.signature.clone())
            .with_error(error.to_string());

        if let Err(e) = self.failures.record_failure(&record).await {
            events::anomaly(ctx, "fetch.capture-error", &e);
        }
    }

    fn fail(&self, ctx: &CallContext<'_>, event: &str, error: CacheError) -> CacheError {
        events::failed(ctx, event, &error);
        error
    }

    fn result(
        &self,
        ctx: &CallContext<'_>,
        table: Table,
        status: FetchStatus,
        record: &CacheIndexRecord,
        fallback_reason: Option<String>,
    ) -> RepositoryResult {
        let artifact_path: PathBuf = self.store.resolve(record);
        RepositoryResult {
            source_id: ctx.source_id.to_string(),
            table,
            status,
            artifact_path,
            cache_key: ctx.key.hash.clone(),
            correlation_id: ctx.correlation_id.to_string(),
            metadata: ResultMetadata {
                fallback_reason,
                ..ResultMetadata::from(record)
            },
        }
    }
}
