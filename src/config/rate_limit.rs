//! Rate limit configuration

use serde::Deserialize;

use crate::adapters::rate_limiter::RateLimitConfig;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Webhook deliveries allowed per source IP per minute
    #[serde(default = "default_webhook_per_minute")]
    pub webhook_requests_per_minute: u32,

    #[serde(default = "default_global_per_minute")]
    pub global_requests_per_minute: u32,
}

impl RateLimitSettings {
    pub fn limiter_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::for_webhook(self.webhook_requests_per_minute);
        config.global.requests_per_minute = self.global_requests_per_minute;
        config
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_requests_per_minute == 0 || self.global_requests_per_minute == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        Ok(())
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            webhook_requests_per_minute: default_webhook_per_minute(),
            global_requests_per_minute: default_global_per_minute(),
        }
    }
}

fn default_webhook_per_minute() -> u32 {
    120
}

fn default_global_per_minute() -> u32 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::rate_limiter::BILLING_WEBHOOK_RESOURCE;

    #[test]
    fn test_limiter_config_uses_settings() {
        let settings = RateLimitSettings {
            webhook_requests_per_minute: 30,
            global_requests_per_minute: 500,
        };
        let config = settings.limiter_config();
        assert_eq!(config.global.requests_per_minute, 500);
        assert_eq!(
            config.resources[BILLING_WEBHOOK_RESOURCE].requests_per_window,
            30
        );
    }

    #[test]
    fn test_zero_limit_rejected() {
        let settings = RateLimitSettings {
            webhook_requests_per_minute: 0,
            ..Default::default()
        };
        assert_eq!(settings.validate(), Err(ValidationError::InvalidRateLimit));
    }
}
