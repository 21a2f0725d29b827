//! Dataset cache
//!
//! A read-through cache in front of slow external datasets:
//! - Deterministic cache keys from a source id and query parameters
//! - JSON artifacts on disk indexed by a SQLite catalogue
//! - TTL freshness, stale fallback on connector failure, offline mode
//! - Schema validation with failure capture for rejected payloads
//! - Per-source locking so concurrent writers never interleave

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{AppConfig, CacheSettings};
pub use domain::{
    compute_key, CacheError, CacheIndexRecord, Connector, ConnectorRegistry, FetchError, Query,
    QueryValue, Table,
};
pub use infrastructure::cache::CacheStore;
pub use infrastructure::repository::{
    FetchStatus, Repository, RepositoryBuilder, RepositoryResult, ResultMetadata,
};
