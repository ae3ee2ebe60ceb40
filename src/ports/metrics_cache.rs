//! Metrics cache port.
//!
//! Computed metrics views are cached as JSON under a key derived from the
//! request parameters. Entries expire after their TTL.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache value could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait MetricsCache: Send + Sync {
    /// Returns the cached value if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Stores a value for `ttl`.
    async fn put(&self, key: &str, value: serde_json::Value, ttl: Duration)
        -> Result<(), CacheError>;

    /// Drops a single key.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}
