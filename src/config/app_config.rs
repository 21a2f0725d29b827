use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Overrides the cache root from the environment
pub const CACHE_ROOT_ENV: &str = "DATASET_CACHE_ROOT";
/// Overrides the failure-capture root from the environment
pub const FAILURE_ROOT_ENV: &str = "DATASET_FAILURE_ROOT";

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cache location and behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
    #[serde(default = "default_failure_root")]
    pub failure_root: PathBuf,
    /// Serve cached artifacts only, never calling connectors
    #[serde(default)]
    pub offline: bool,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_lock_poll_interval_ms")]
    pub lock_poll_interval_ms: u64,
    #[serde(default = "default_index_max_connections")]
    pub index_max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_failure_root() -> PathBuf {
    PathBuf::from("data/failures")
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

fn default_lock_poll_interval_ms() -> u64 {
    25
}

fn default_index_max_connections() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            failure_root: default_failure_root(),
            offline: false,
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_poll_interval_ms: default_lock_poll_interval_ms(),
            index_max_connections: default_index_max_connections(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl CacheSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_failure_root(mut self, failure_root: impl Into<PathBuf>) -> Self {
        self.failure_root = failure_root.into();
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_index_max_connections(mut self, max: u32) -> Self {
        self.index_max_connections = max;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms.max(1))
    }

    /// Applies `DATASET_CACHE_ROOT` / `DATASET_FAILURE_ROOT` when set
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(CACHE_ROOT_ENV).ok(),
            std::env::var(FAILURE_ROOT_ENV).ok(),
        )
    }

    fn with_overrides(mut self, cache_root: Option<String>, failure_root: Option<String>) -> Self {
        if let Some(root) = cache_root.filter(|value| !value.trim().is_empty()) {
            self.root = PathBuf::from(root);
        }
        if let Some(root) = failure_root.filter(|value| !value.trim().is_empty()) {
            self.failure_root = PathBuf::from(root);
        }
        self
    }
}

impl AppConfig {
    /// Loads `config/default`, `config/local`, then `APP__*` variables, then
    /// the dataset root overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: Self = config.try_deserialize()?;
        app.cache = app.cache.with_env_overrides();
        Ok(app)
    }
}
