//! Per-source mutual exclusion for cache writes

use std::fmt::{self, Debug};

use async_trait::async_trait;

use crate::domain::error::CacheError;

/// Held lock on one source; released when dropped
///
/// Dropping covers every exit path, including errors and panics.
pub struct SourceLockGuard {
    source_id: String,
    _held: Box<dyn Send + Sync>,
}

impl SourceLockGuard {
    /// Wraps whatever value keeps the underlying lock held
    pub fn new(source_id: impl Into<String>, held: impl Send + Sync + 'static) -> Self {
        Self {
            source_id: source_id.into(),
            _held: Box::new(held),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl Debug for SourceLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceLockGuard")
            .field("source_id", &self.source_id)
            .finish_non_exhaustive()
    }
}

impl Drop for SourceLockGuard {
    fn drop(&mut self) {
        tracing::debug!(source_id = %self.source_id, "Releasing source lock");
    }
}

/// Named lock serialising writes for a source
#[async_trait]
pub trait SourceLock: Send + Sync + Debug {
    async fn acquire(&self, source_id: &str) -> Result<SourceLockGuard, CacheError>;
}
