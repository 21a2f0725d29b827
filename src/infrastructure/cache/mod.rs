//! Cache infrastructure - SQLite index and artifact store

pub mod paths;
mod sqlite_index;
mod store;

pub use sqlite_index::{SqliteCacheIndex, SqliteIndexConfig, DEFAULT_MAX_CONNECTIONS};
pub use store::CacheStore;
