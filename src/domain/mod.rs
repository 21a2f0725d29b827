//! Domain layer - cache model, consumed capabilities and error taxonomy

pub mod cache;
pub mod clock;
pub mod connector;
pub mod correlation;
pub mod error;
pub mod failure;
pub mod lock;
pub mod query;
pub mod table;
pub mod validator;

pub use cache::{compute_key, query_signature, CacheIndex, CacheIndexRecord, CacheKey};
pub use clock::{Clock, ManualClock, SystemClock};
pub use connector::{ttl_days_from_seconds, Connector, ConnectorRegistry, FetchError};
pub use correlation::{current_correlation_id, new_correlation_id, with_correlation};
pub use error::CacheError;
pub use failure::{FailureRecord, FailureSink};
pub use lock::{SourceLock, SourceLockGuard};
pub use query::{Query, QueryValue};
pub use table::{Row, Table};
pub use validator::{SchemaValidator, SchemaViolation};
