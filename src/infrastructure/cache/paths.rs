//! On-disk layout of a cache root
//!
//! ```text
//! <root>/cache_index.sqlite
//! <root>/<source_id>/<key_hash>.json
//! <root>/<source_id>/.lock
//! ```

use std::path::{Path, PathBuf};

pub const INDEX_FILE_NAME: &str = "cache_index.sqlite";
pub const LOCK_FILE_NAME: &str = ".lock";
pub const ARTIFACT_EXTENSION: &str = "json";

/// Make a source id safe to use as a single path segment
pub fn sanitize_segment(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match sanitized.as_str() {
        "" | "." | ".." => format!("_{}", sanitized),
        _ => sanitized,
    }
}

/// Artifact location relative to the cache root
pub fn relative_artifact_path(source_id: &str, key_hash: &str) -> PathBuf {
    PathBuf::from(sanitize_segment(source_id))
        .join(format!("{}.{}", key_hash, ARTIFACT_EXTENSION))
}

pub fn source_dir(root: &Path, source_id: &str) -> PathBuf {
    root.join(sanitize_segment(source_id))
}

pub fn artifact_path(root: &Path, source_id: &str, key_hash: &str) -> PathBuf {
    root.join(relative_artifact_path(source_id, key_hash))
}

pub fn lock_path(root: &Path, source_id: &str) -> PathBuf {
    source_dir(root, source_id).join(LOCK_FILE_NAME)
}

pub fn index_path(root: &Path) -> PathBuf {
    root.join(INDEX_FILE_NAME)
}
