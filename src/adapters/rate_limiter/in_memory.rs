//! In-memory rate limiter.
//!
//! Fixed-window counters in a HashMap. Limits are per process, so a
//! multi-node deployment gets one budget per node.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitConfig;

#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: Arc<RwLock<HashMap<String, WindowState>>>,
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    /// Unix seconds at which the window opened.
    window_start: u64,
    window_secs: u32,
}

impl WindowState {
    fn window_end(&self) -> u64 {
        self.window_start + self.window_secs as u64
    }
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    fn now_secs() -> u64 {
        Timestamp::now().as_unix_secs()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let storage_key = key.storage_key();
        let (limit, window_secs) = self.config.limits_for(&key);
        let now = Self::now_secs();

        let mut windows = self.windows.write().await;
        let state = windows.entry(storage_key).or_insert_with(|| WindowState {
            count: 0,
            window_start: now,
            window_secs,
        });

        if now >= state.window_end() {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= limit {
            let retry_after = state.window_end().saturating_sub(now) as u32;
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs: retry_after.max(1),
                scope: key.scope,
                message: format!(
                    "Rate limit exceeded for {}. Retry after {} seconds.",
                    key.scope, retry_after
                ),
            }));
        }

        state.count += 1;
        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(state.count),
            reset_at: Timestamp::from_unix_secs(state.window_end()),
            window_secs,
        }))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let (limit, window_secs) = self.config.limits_for(&key);
        let now = Self::now_secs();

        let windows = self.windows.read().await;
        let (count, window_start) = windows
            .get(&key.storage_key())
            .filter(|state| now < state.window_end())
            .map(|state| (state.count, state.window_start))
            .unwrap_or((0, now));

        Ok(RateLimitStatus {
            limit,
            remaining: limit.saturating_sub(count),
            reset_at: Timestamp::from_unix_secs(window_start + window_secs as u64),
            window_secs,
        })
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(&key.storage_key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rate_limiter::BILLING_WEBHOOK_RESOURCE;
    use crate::ports::RateLimitScope;

    fn limiter_with_ip_limit(limit: u32) -> InMemoryRateLimiter {
        let mut config = RateLimitConfig::default();
        config.per_ip.requests_per_minute = limit;
        InMemoryRateLimiter::new(config)
    }

    // ══════════════════════════════════════════════════════════════
    // Window Accounting
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn allows_requests_within_limit() {
        let limiter = InMemoryRateLimiter::with_defaults();
        let key = RateLimitKey::ip("192.168.1.1");

        for i in 0..10 {
            let result = limiter.check(key.clone()).await.unwrap();
            assert!(result.is_allowed(), "Request {} should be allowed", i + 1);
        }
    }

    #[tokio::test]
    async fn denies_requests_at_limit() {
        let limiter = limiter_with_ip_limit(5);
        let key = RateLimitKey::ip("192.168.1.1");

        for _ in 0..5 {
            assert!(limiter.check(key.clone()).await.unwrap().is_allowed());
        }

        match limiter.check(key.clone()).await.unwrap() {
            RateLimitResult::Denied(denied) => {
                assert_eq!(denied.limit, 5);
                assert!(denied.retry_after_secs > 0);
                assert_eq!(denied.scope, RateLimitScope::Ip);
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn status_returns_remaining_count() {
        let limiter = limiter_with_ip_limit(10);
        let key = RateLimitKey::ip("10.0.0.1");

        assert_eq!(limiter.status(key.clone()).await.unwrap().remaining, 10);
        for _ in 0..3 {
            limiter.check(key.clone()).await.unwrap();
        }
        assert_eq!(limiter.status(key.clone()).await.unwrap().remaining, 7);
    }

    #[tokio::test]
    async fn reset_clears_counter() {
        let limiter = limiter_with_ip_limit(2);
        let key = RateLimitKey::ip("10.0.0.2");

        for _ in 0..2 {
            limiter.check(key.clone()).await.unwrap();
        }
        assert!(limiter.check(key.clone()).await.unwrap().is_denied());

        limiter.reset(key.clone()).await.unwrap();
        assert!(limiter.check(key).await.unwrap().is_allowed());
    }

    // ══════════════════════════════════════════════════════════════
    // Key Independence
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn different_ips_have_independent_limits() {
        let limiter = limiter_with_ip_limit(3);
        let key1 = RateLimitKey::ip("1.1.1.1");
        let key2 = RateLimitKey::ip("2.2.2.2");

        for _ in 0..3 {
            limiter.check(key1.clone()).await.unwrap();
        }
        assert!(limiter.check(key1).await.unwrap().is_denied());
        assert!(limiter.check(key2).await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn webhook_resource_has_its_own_budget() {
        let limiter = InMemoryRateLimiter::new(RateLimitConfig::for_webhook(1));
        let webhook = RateLimitKey::ip_resource("1.1.1.1", BILLING_WEBHOOK_RESOURCE);

        assert!(limiter.check(webhook.clone()).await.unwrap().is_allowed());
        assert!(limiter.check(webhook).await.unwrap().is_denied());
        assert!(limiter
            .check(RateLimitKey::ip("1.1.1.1"))
            .await
            .unwrap()
            .is_allowed());
    }
}
