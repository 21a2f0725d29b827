//! Cross-process source lock backed by OS advisory file locks

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::lock::{SourceLock, SourceLockGuard};
use crate::domain::CacheError;
use crate::infrastructure::cache::paths;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive lock on `<root>/<source_id>/.lock`
///
/// Acquisition polls a non-blocking lock until it succeeds or the timeout
/// elapses, so a waiting task never blocks a runtime thread.
#[derive(Debug, Clone)]
pub struct FileSourceLock {
    root: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl FileSourceLock {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            timeout: DEFAULT_LOCK_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn lock_path(&self, source_id: &str) -> PathBuf {
        paths::lock_path(&self.root, source_id)
    }

    fn open_lock_file(path: &Path) -> Result<File, CacheError> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| CacheError::io(format!("opening lock file {}", path.display()), e))
    }
}

/// Keeps the file lock held; unlocks on drop
struct HeldFileLock {
    file: File,
    path: PathBuf,
}

impl Drop for HeldFileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Failed to unlock source lock file");
        }
    }
}

#[async_trait]
impl SourceLock for FileSourceLock {
    async fn acquire(&self, source_id: &str) -> Result<SourceLockGuard, CacheError> {
        let path = self.lock_path(source_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(format!("creating {}", parent.display()), e))?;
        }
        let file = Self::open_lock_file(&path)?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!(
                        source_id = %source_id,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Acquired source lock"
                    );
                    return Ok(SourceLockGuard::new(source_id, HeldFileLock { file, path }));
                }
                Err(TryLockError::WouldBlock) => {
                    let waited = started.elapsed();
                    if waited >= self.timeout {
                        return Err(CacheError::LockTimeout {
                            source_id: source_id.to_string(),
                            waited_ms: waited.as_millis() as u64,
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(TryLockError::Error(e)) => {
                    return Err(CacheError::io(format!("locking {}", path.display()), e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn lock(dir: &TempDir) -> FileSourceLock {
        FileSourceLock::new(dir.path())
            .with_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_acquire_creates_lock_file() {
        let dir = TempDir::new().unwrap();
        let lock = lock(&dir);

        let guard = lock.acquire("connector.a").await.unwrap();

        assert_eq!(guard.source_id(), "connector.a");
        assert!(dir.path().join("connector.a").join(".lock").exists());
    }

    #[tokio::test]
    async fn test_second_acquire_times_out_while_held() {
        let dir = TempDir::new().unwrap();
        let lock = lock(&dir);

        let _guard = lock.acquire("connector.a").await.unwrap();
        let result = lock.acquire("connector.a").await;

        match result {
            Err(CacheError::LockTimeout { source_id, waited_ms }) => {
                assert_eq!(source_id, "connector.a");
                assert!(waited_ms >= 200);
            }
            other => panic!("expected lock timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let lock = lock(&dir);

        let guard = lock.acquire("connector.a").await.unwrap();
        drop(guard);

        assert!(lock.acquire("connector.a").await.is_ok());
    }

    #[tokio::test]
    async fn test_released_when_holder_panics() {
        let dir = TempDir::new().unwrap();
        let lock = lock(&dir);

        let holder = lock.clone();
        let task = tokio::spawn(async move {
            let _guard = holder.acquire("connector.a").await.unwrap();
            panic!("fetch blew up while holding the lock");
        });
        assert!(task.await.is_err());

        assert!(lock.acquire("connector.a").await.is_ok());
    }

    #[tokio::test]
    async fn test_sources_do_not_contend() {
        let dir = TempDir::new().unwrap();
        let lock = lock(&dir);

        let _a = lock.acquire("connector.a").await.unwrap();
        assert!(lock.acquire("connector.b").await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_serialises_concurrent_holders() {
        let dir = TempDir::new().unwrap();
        let lock = FileSourceLock::new(dir.path()).with_poll_interval(Duration::from_millis(1));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = lock.acquire("connector.a").await.unwrap();
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
