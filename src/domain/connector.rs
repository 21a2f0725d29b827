//! Connector abstraction and registry
//!
//! Connectors are the live data sources behind the cache. The repository
//! only sees them through this trait and resolves them by `source_id` from an
//! explicit registry.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::error::CacheError;
use crate::domain::query::Query;
use crate::domain::table::Table;

const SECONDS_PER_DAY: i64 = 86_400;

/// Failure reported by a connector fetch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Network, rate limit or upstream outage; eligible for stale fallback
    #[error("{0}")]
    Transient(String),

    /// The upstream answered with a structurally invalid payload
    #[error("{message}")]
    Schema {
        message: String,
        payload: Option<Table>,
    },

    /// Anything else the connector did not anticipate
    #[error("{0}")]
    Unexpected(String),
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn schema(message: impl Into<String>, payload: Option<Table>) -> Self {
        Self::Schema {
            message: message.into(),
            payload,
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

/// Converts a nominal TTL in seconds to whole days
///
/// Positive values round up and never go below one day; anything else is 0.
pub fn ttl_days_from_seconds(ttl_seconds: i64) -> u32 {
    if ttl_seconds <= 0 {
        return 0;
    }
    let days = ttl_seconds / SECONDS_PER_DAY + i64::from(ttl_seconds % SECONDS_PER_DAY != 0);
    u32::try_from(days).unwrap_or(u32::MAX).max(1)
}

/// A named external data source
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Stable identifier, also the schema name used for validation
    fn source_id(&self) -> &str;

    /// Nominal refresh interval
    fn ttl_seconds(&self) -> i64 {
        SECONDS_PER_DAY
    }

    fn schema_version(&self) -> Option<&str> {
        None
    }

    fn ttl_days(&self) -> u32 {
        ttl_days_from_seconds(self.ttl_seconds())
    }

    /// Fetch the payload for a query
    async fn fetch(&self, query: &Query) -> Result<Table, FetchError>;
}

/// Explicit mapping from source id to connector
#[derive(Debug, Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector, rejecting a second one under the same source id
    pub fn register(&mut self, connector: Arc<dyn Connector>) -> Result<(), CacheError> {
        let source_id = connector.source_id().to_string();
        if self.connectors.contains_key(&source_id) {
            return Err(CacheError::configuration(format!(
                "Connector '{}' is already registered",
                source_id
            )));
        }
        self.connectors.insert(source_id, connector);
        Ok(())
    }

    /// Builder-style registration, replacing any connector with the same id
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors
            .insert(connector.source_id().to_string(), connector);
        self
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(source_id).cloned()
    }

    /// Resolves a connector or fails with a configuration error
    pub fn resolve(&self, source_id: &str) -> Result<Arc<dyn Connector>, CacheError> {
        self.get(source_id).ok_or_else(|| {
            CacheError::configuration(format!("Unknown source '{}'", source_id))
        })
    }

    /// Registered source ids, sorted
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.connectors.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Connector replaying a scripted sequence of outcomes
    ///
    /// The last scripted outcome repeats once the script is exhausted.
    #[derive(Debug)]
    pub struct ScriptedConnector {
        source_id: String,
        ttl_seconds: i64,
        schema_version: Option<String>,
        script: Mutex<VecDeque<Result<Table, FetchError>>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedConnector {
        pub fn new(source_id: impl Into<String>) -> Self {
            Self {
                source_id: source_id.into(),
                ttl_seconds: SECONDS_PER_DAY,
                schema_version: None,
                script: Mutex::new(VecDeque::new()),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_ttl_seconds(mut self, ttl_seconds: i64) -> Self {
            self.ttl_seconds = ttl_seconds;
            self
        }

        pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
            self.schema_version = Some(version.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn then_ok(self, table: Table) -> Self {
            self.script.lock().unwrap().push_back(Ok(table));
            self
        }

        pub fn then_err(self, error: FetchError) -> Self {
            self.script.lock().unwrap().push_back(Err(error));
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        fn source_id(&self) -> &str {
            &self.source_id
        }

        fn ttl_seconds(&self) -> i64 {
            self.ttl_seconds
        }

        fn schema_version(&self) -> Option<&str> {
            self.schema_version.as_deref()
        }

        async fn fetch(&self, _query: &Query) -> Result<Table, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                return script.pop_front().unwrap();
            }
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::unexpected("no scripted response")))
        }
    }
}
