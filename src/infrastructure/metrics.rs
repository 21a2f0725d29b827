//! Cache outcome metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::domain::CacheError;
use crate::infrastructure::repository::FetchStatus;

/// Record a `get` that produced a result
pub fn record_request(source_id: &str, status: FetchStatus, duration: Duration) {
    let labels = [
        ("source_id", source_id.to_string()),
        ("status", status.as_str().to_string()),
    ];

    counter!("dataset_cache_requests_total", &labels).increment(1);
    histogram!("dataset_cache_get_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record a `get` that ended in an error
pub fn record_failure(source_id: &str, error: &CacheError, duration: Duration) {
    let labels = [
        ("source_id", source_id.to_string()),
        ("kind", error.kind().to_string()),
    ];

    let duration_labels = [
        ("source_id", source_id.to_string()),
        ("status", "error".to_string()),
    ];

    counter!("dataset_cache_failures_total", &labels).increment(1);
    histogram!("dataset_cache_get_duration_seconds", &duration_labels)
        .record(duration.as_secs_f64());
}
