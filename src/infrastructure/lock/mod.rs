//! Source lock implementations

mod file_lock;
mod in_process;

pub use file_lock::{FileSourceLock, DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use in_process::InProcessSourceLock;
