//! Rate limiting port for protecting the webhook endpoint.
//!
//! Fixed-window counters keyed by scope. The billing webhook is limited per
//! source IP so a misbehaving sender cannot starve the reconciler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::Timestamp;

/// Port for rate limiting operations.
///
/// Implementations should be thread-safe and support concurrent access.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if request is allowed, consuming a token if so.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError>;

    /// Get current rate limit status without consuming a token.
    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError>;

    /// Reset rate limit for a key (admin operation).
    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError>;
}

/// Key identifying what to rate limit.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub scope: RateLimitScope,
    /// Identifier within the scope (e.g., IP address).
    pub identifier: String,
    /// Optional resource for finer-grained limits (e.g., "billing_webhook").
    pub resource: Option<String>,
}

/// The scope at which rate limiting is applied.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// Global rate limit across all requests.
    Global,
    /// Per-IP address rate limit.
    Ip,
}

impl RateLimitKey {
    pub fn global() -> Self {
        Self {
            scope: RateLimitScope::Global,
            identifier: "global".to_string(),
            resource: None,
        }
    }

    pub fn ip(ip: &str) -> Self {
        Self {
            scope: RateLimitScope::Ip,
            identifier: ip.to_string(),
            resource: None,
        }
    }

    /// Per-IP key for a specific endpoint.
    pub fn ip_resource(ip: &str, resource: &str) -> Self {
        Self {
            scope: RateLimitScope::Ip,
            identifier: ip.to_string(),
            resource: Some(resource.to_string()),
        }
    }

    /// Flat storage key for this rate limit key.
    pub fn storage_key(&self) -> String {
        match &self.resource {
            Some(resource) => format!(
                "ratelimit:{}:{}:{}",
                self.scope.as_str(),
                self.identifier,
                resource
            ),
            None => format!("ratelimit:{}:{}", self.scope.as_str(), self.identifier),
        }
    }
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Global => "global",
            RateLimitScope::Ip => "ip",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    Allowed(RateLimitStatus),
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Remaining requests in the current window.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: Timestamp,
    pub window_secs: u32,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone)]
pub struct RateLimitDenied {
    pub limit: u32,
    /// Seconds until the client should retry.
    pub retry_after_secs: u32,
    pub scope: RateLimitScope,
    pub message: String,
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_key_has_correct_scope() {
        let key = RateLimitKey::global();
        assert_eq!(key.scope, RateLimitScope::Global);
        assert_eq!(key.identifier, "global");
        assert!(key.resource.is_none());
    }

    #[test]
    fn ip_resource_key_includes_resource() {
        let key = RateLimitKey::ip_resource("10.0.0.1", "billing_webhook");
        assert_eq!(key.scope, RateLimitScope::Ip);
        assert_eq!(key.resource.as_deref(), Some("billing_webhook"));
    }

    #[test]
    fn storage_key_format() {
        assert_eq!(RateLimitKey::ip("10.0.0.1").storage_key(), "ratelimit:ip:10.0.0.1");
        assert_eq!(
            RateLimitKey::ip_resource("10.0.0.1", "billing_webhook").storage_key(),
            "ratelimit:ip:10.0.0.1:billing_webhook"
        );
    }

    #[test]
    fn rate_limit_result_predicates() {
        let allowed = RateLimitResult::Allowed(RateLimitStatus {
            limit: 100,
            remaining: 50,
            reset_at: Timestamp::now(),
            window_secs: 60,
        });
        assert!(allowed.is_allowed());

        let denied = RateLimitResult::Denied(RateLimitDenied {
            limit: 100,
            retry_after_secs: 30,
            scope: RateLimitScope::Ip,
            message: "Rate limit exceeded".to_string(),
        });
        assert!(denied.is_denied());
    }
}
