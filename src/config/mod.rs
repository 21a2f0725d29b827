//! Layered application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, LogFormat, LoggingConfig, CACHE_ROOT_ENV, FAILURE_ROOT_ENV,
};
