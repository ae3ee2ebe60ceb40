//! Rate limiter adapters.
//!
//! ## Usage
//!
//! ```ignore
//! use household_billing::adapters::rate_limiter::{InMemoryRateLimiter, RateLimitConfig};
//!
//! let limiter = InMemoryRateLimiter::new(RateLimitConfig::for_webhook(120));
//! ```

mod config;
mod in_memory;

pub use config::{
    GlobalLimits, IpLimits, RateLimitConfig, ResourceLimits, BILLING_WEBHOOK_RESOURCE,
};
pub use in_memory::InMemoryRateLimiter;
