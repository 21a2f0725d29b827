use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving a dataset through the cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Schema error for '{source_id}': {message}")]
    Schema {
        source_id: String,
        message: String,
        missing: Vec<String>,
    },

    #[error("Connector error for '{source_id}': {message}")]
    Connector { source_id: String, message: String },

    #[error("Offline mode: no cached artifact for '{source_id}' (cache key {cache_key})")]
    OfflineMiss { source_id: String, cache_key: String },

    #[error("Cached artifact missing for '{source_id}': {}", path.display())]
    ArtifactMissing { source_id: String, path: PathBuf },

    #[error("Cached artifact unreadable at {}: {message}", path.display())]
    ArtifactCorrupt { path: PathBuf, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Cache index error: {message}")]
    Index { message: String },

    #[error("Timed out after {waited_ms}ms waiting for the lock on '{source_id}'")]
    LockTimeout { source_id: String, waited_ms: u64 },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn schema(
        source_id: impl Into<String>,
        message: impl Into<String>,
        missing: Vec<String>,
    ) -> Self {
        Self::Schema {
            source_id: source_id.into(),
            message: message.into(),
            missing,
        }
    }

    pub fn connector(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connector {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn offline_miss(source_id: impl Into<String>, cache_key: impl Into<String>) -> Self {
        Self::OfflineMiss {
            source_id: source_id.into(),
            cache_key: cache_key.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Short machine-friendly name used as a log field and metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::Schema { .. } => "schema",
            Self::Connector { .. } => "connector",
            Self::OfflineMiss { .. } => "offline_miss",
            Self::ArtifactMissing { .. } => "artifact_missing",
            Self::ArtifactCorrupt { .. } => "artifact_corrupt",
            Self::Serialization { .. } => "serialization",
            Self::Index { .. } => "index",
            Self::LockTimeout { .. } => "lock_timeout",
            Self::Io { .. } => "io",
        }
    }

    /// True for failures of the live fetch, including an offline miss
    pub fn is_connector_error(&self) -> bool {
        matches!(self, Self::Connector { .. } | Self::OfflineMiss { .. })
    }

    /// True for internal index/store inconsistencies
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            Self::ArtifactMissing { .. }
                | Self::ArtifactCorrupt { .. }
                | Self::Index { .. }
                | Self::LockTimeout { .. }
        )
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}
