//! Failure capture implementations

mod fs_sink;

pub use fs_sink::FsFailureSink;
