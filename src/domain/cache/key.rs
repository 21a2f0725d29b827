//! Cache key derivation
//!
//! A key is `hex(sha256(source_id + "::" + signature))`, where the signature
//! is the canonical sorted-key JSON rendering of the query.

use sha2::{Digest, Sha256};

use crate::domain::query::Query;

/// Separator between the source id and the query signature in the hash input
const KEY_SEPARATOR: &str = "::";

/// Canonical JSON signature of a query
pub fn query_signature(query: &Query) -> String {
    query.normalized().to_string()
}

/// Hex-encoded SHA-256 key for a source and query
pub fn compute_key(source_id: &str, query: &Query) -> String {
    hash_signature(source_id, &query_signature(query))
}

fn hash_signature(source_id: &str, signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_id.as_bytes());
    hasher.update(KEY_SEPARATOR.as_bytes());
    hasher.update(signature.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key hash together with the signature it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub hash: String,
    pub signature: String,
}

impl CacheKey {
    pub fn derive(source_id: &str, query: &Query) -> Self {
        let signature = query_signature(query);
        let hash = hash_signature(source_id, &signature);
        Self { hash, signature }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hash)
    }
}
