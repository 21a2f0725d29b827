//! Structured events emitted by `Repository::get`
//!
//! Every call logs a `fetch.start` event and exactly one terminal event. All
//! of them carry the correlation id, cache key and query signature.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::result::FetchStatus;
use crate::domain::{CacheError, CacheKey};
use crate::infrastructure::metrics;

pub(super) const TARGET: &str = "dataset_cache::repository";
pub(super) const EVENT: &str = "repository.fetch";
pub(super) const MODULE: &str = "repository";
pub(super) const ACTION: &str = "get";

/// Per-call identifiers shared by every event of one `get`
pub(super) struct CallContext<'a> {
    pub source_id: &'a str,
    pub key: &'a CacheKey,
    pub correlation_id: &'a str,
    started: Instant,
}

impl<'a> CallContext<'a> {
    pub fn new(source_id: &'a str, key: &'a CacheKey, correlation_id: &'a str) -> Self {
        Self {
            source_id,
            key,
            correlation_id,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

pub(super) fn start(ctx: &CallContext<'_>, offline: bool) {
    info!(
        target: TARGET,
        event = EVENT,
        module = MODULE,
        action = ACTION,
        source_id = ctx.source_id,
        correlation_id = ctx.correlation_id,
        cache_key = %ctx.key.hash,
        query_signature = %ctx.key.signature,
        offline,
        "fetch.start"
    );
}

/// Intermediate step worth tracing, not a call outcome
pub(super) fn step(ctx: &CallContext<'_>, message: &str) {
    info!(
        target: TARGET,
        event = EVENT,
        module = MODULE,
        action = ACTION,
        source_id = ctx.source_id,
        correlation_id = ctx.correlation_id,
        cache_key = %ctx.key.hash,
        query_signature = %ctx.key.signature,
        "{}",
        message
    );
}

/// Recoverable problem that does not end the call
pub(super) fn anomaly(ctx: &CallContext<'_>, message: &str, error: &CacheError) {
    warn!(
        target: TARGET,
        event = EVENT,
        module = MODULE,
        action = ACTION,
        source_id = ctx.source_id,
        correlation_id = ctx.correlation_id,
        cache_key = %ctx.key.hash,
        query_signature = %ctx.key.signature,
        error = %error,
        duration_ms = ctx.elapsed_ms(),
        "{}",
        message
    );
}

/// Terminal event for a call that returned data
pub(super) fn served(ctx: &CallContext<'_>, message: &str, status: FetchStatus, artifact: &Path) {
    info!(
        target: TARGET,
        event = EVENT,
        module = MODULE,
        action = ACTION,
        source_id = ctx.source_id,
        correlation_id = ctx.correlation_id,
        cache_key = %ctx.key.hash,
        query_signature = %ctx.key.signature,
        status = status.as_str(),
        artifact = %artifact.display(),
        duration_ms = ctx.elapsed_ms(),
        "{}",
        message
    );
    metrics::record_request(ctx.source_id, status, ctx.elapsed());
}

/// Terminal event for a call that degraded to the cached artifact
pub(super) fn fell_back(ctx: &CallContext<'_>, message: &str, artifact: &Path, reason: &str) {
    warn!(
        target: TARGET,
        event = EVENT,
        module = MODULE,
        action = ACTION,
        source_id = ctx.source_id,
        correlation_id = ctx.correlation_id,
        cache_key = %ctx.key.hash,
        query_signature = %ctx.key.signature,
        status = FetchStatus::Stale.as_str(),
        artifact = %artifact.display(),
        duration_ms = ctx.elapsed_ms(),
        error = reason,
        "{}",
        message
    );
    metrics::record_request(ctx.source_id, FetchStatus::Stale, ctx.elapsed());
}

/// Terminal event for a call that failed
pub(super) fn failed(ctx: &CallContext<'_>, message: &str, error: &CacheError) {
    error!(
        target: TARGET,
        event = EVENT,
        module = MODULE,
        action = ACTION,
        source_id = ctx.source_id,
        correlation_id = ctx.correlation_id,
        cache_key = %ctx.key.hash,
        query_signature = %ctx.key.signature,
        status = "error",
        error_kind = error.kind(),
        error = %error,
        duration_ms = ctx.elapsed_ms(),
        "{}",
        message
    );
    metrics::record_failure(ctx.source_id, error, ctx.elapsed());
}

/// Terminal event for a call naming a source with no registered connector
pub(super) fn unknown_source(
    source_id: &str,
    correlation_id: &str,
    error: &CacheError,
    elapsed: Duration,
) {
    error!(
        target: TARGET,
        event = EVENT,
        module = MODULE,
        action = ACTION,
        source_id,
        correlation_id,
        status = "error",
        error_kind = error.kind(),
        error = %error,
        duration_ms = elapsed.as_millis() as u64,
        "fetch.unknown-source"
    );
    metrics::record_failure(source_id, error, elapsed);
}
