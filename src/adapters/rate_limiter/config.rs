//! Rate limit configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ports::{RateLimitKey, RateLimitScope};

/// Resource name used for the billing webhook endpoint.
pub const BILLING_WEBHOOK_RESOURCE: &str = "billing_webhook";

/// Complete rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Global rate limits (infrastructure protection).
    pub global: GlobalLimits,
    /// Per-IP rate limits when no resource override applies.
    pub per_ip: IpLimits,
    /// Per-resource overrides for IP-scoped keys.
    pub resources: HashMap<String, ResourceLimits>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalLimits {
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpLimits {
    pub requests_per_minute: u32,
}

/// Rate limits for a specific resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum requests per window.
    pub requests_per_window: u32,
    /// Window duration in seconds.
    pub window_secs: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::for_webhook(120)
    }
}

impl RateLimitConfig {
    /// Configuration with the billing webhook limited per source IP.
    pub fn for_webhook(webhook_requests_per_minute: u32) -> Self {
        let mut resources = HashMap::new();
        resources.insert(
            BILLING_WEBHOOK_RESOURCE.to_string(),
            ResourceLimits {
                requests_per_window: webhook_requests_per_minute,
                window_secs: 60,
            },
        );

        Self {
            global: GlobalLimits {
                requests_per_minute: 10_000,
            },
            per_ip: IpLimits {
                requests_per_minute: 100,
            },
            resources,
        }
    }

    /// Returns `(limit, window_secs)` for a key.
    pub fn limits_for(&self, key: &RateLimitKey) -> (u32, u32) {
        match key.scope {
            RateLimitScope::Global => (self.global.requests_per_minute, 60),
            RateLimitScope::Ip => key
                .resource
                .as_deref()
                .and_then(|resource| self.resources.get(resource))
                .map(|r| (r.requests_per_window, r.window_secs))
                .unwrap_or((self.per_ip.requests_per_minute, 60)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_global_limit_is_10000() {
        let config = RateLimitConfig::default();
        assert_eq!(config.global.requests_per_minute, 10_000);
    }

    #[test]
    fn webhook_resource_uses_configured_limit() {
        let config = RateLimitConfig::for_webhook(30);
        let key = RateLimitKey::ip_resource("10.0.0.1", BILLING_WEBHOOK_RESOURCE);
        assert_eq!(config.limits_for(&key), (30, 60));
    }

    #[test]
    fn unknown_resource_falls_back_to_per_ip() {
        let config = RateLimitConfig::default();
        let key = RateLimitKey::ip_resource("10.0.0.1", "unknown");
        assert_eq!(config.limits_for(&key), (100, 60));
        assert_eq!(config.limits_for(&RateLimitKey::ip("10.0.0.1")), (100, 60));
    }

    #[test]
    fn config_serializes_to_json() {
        let json = serde_json::to_string(&RateLimitConfig::for_webhook(5)).unwrap();
        assert!(json.contains("\"requests_per_window\":5"));
    }
}
