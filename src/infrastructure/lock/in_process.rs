//! Source lock scoped to the current process
//!
//! Narrower than [`super::FileSourceLock`]: it only serialises writers that
//! share this lock instance, so it suits deployments where a single process
//! owns the cache root.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use super::file_lock::DEFAULT_LOCK_TIMEOUT;
use crate::domain::lock::{SourceLock, SourceLockGuard};
use crate::domain::CacheError;

/// One async mutex per source id
#[derive(Debug, Clone)]
pub struct InProcessSourceLock {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
    timeout: Duration,
}

impl Default for InProcessSourceLock {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessSourceLock {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(Mutex::new(HashMap::new())),
            timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn mutex_for(&self, source_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(source_id.to_string()).or_default().clone()
    }
}

#[async_trait]
impl SourceLock for InProcessSourceLock {
    async fn acquire(&self, source_id: &str) -> Result<SourceLockGuard, CacheError> {
        let mutex = self.mutex_for(source_id);
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(held) => Ok(SourceLockGuard::new(source_id, held)),
            Err(_) => Err(CacheError::LockTimeout {
                source_id: source_id.to_string(),
                waited_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
