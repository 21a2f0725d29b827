//! Cache domain - keys, index records and the index abstraction

mod index;
mod key;
mod record;

pub use index::CacheIndex;
pub use key::{compute_key, query_signature, CacheKey};
pub use record::CacheIndexRecord;

#[cfg(test)]
pub use index::mock::MockCacheIndex;
