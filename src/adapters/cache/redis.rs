//! Redis-backed metrics cache.
//!
//! Values are stored as JSON strings with `SET key value EX ttl`, so expiry
//! is enforced by Redis and shared across nodes.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use crate::ports::{CacheError, MetricsCache};

const KEY_PREFIX: &str = "household_billing:";

#[derive(Clone)]
pub struct RedisMetricsCache {
    conn: MultiplexedConnection,
}

impl RedisMetricsCache {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn))
    }

    fn namespaced(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

#[async_trait]
impl MetricsCache for RedisMetricsCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::namespaced(key)).await.map_err(unavailable)?;

        raw.map(|s| serde_json::from_str(&s).map_err(|e| CacheError::Decode(e.to_string())))
            .transpose()
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let payload =
            serde_json::to_string(&value).map_err(|e| CacheError::Decode(e.to_string()))?;
        // Redis rejects EX 0.
        let ttl_secs = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(Self::namespaced(key), payload, ttl_secs)
            .await
            .map_err(unavailable)
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::namespaced(key))
            .await
            .map_err(unavailable)
    }
}

impl std::fmt::Debug for RedisMetricsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMetricsCache").finish_non_exhaustive()
    }
}
