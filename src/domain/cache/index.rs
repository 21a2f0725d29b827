//! Cache index abstraction

use std::fmt::Debug;

use async_trait::async_trait;

use super::record::CacheIndexRecord;
use crate::domain::error::CacheError;

/// Durable metadata store mapping `(source_id, key_hash)` to artifact records
///
/// Implementations never hold payload bytes.
#[async_trait]
pub trait CacheIndex: Send + Sync + Debug {
    /// Fetch the record for a key, if one exists
    async fn lookup(
        &self,
        source_id: &str,
        key_hash: &str,
    ) -> Result<Option<CacheIndexRecord>, CacheError>;

    /// Insert or replace every mutable field of the record for its key
    async fn upsert(&self, record: &CacheIndexRecord) -> Result<(), CacheError>;

    /// All records, optionally restricted to one source, ordered by source then creation
    async fn list(&self, source_id: Option<&str>) -> Result<Vec<CacheIndexRecord>, CacheError>;
}
