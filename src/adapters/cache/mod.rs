//! Metrics cache adapters.

mod in_memory;
mod redis;

pub use in_memory::InMemoryMetricsCache;
pub use self::redis::RedisMetricsCache;
