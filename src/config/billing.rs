//! Reconciliation and metrics tuning.

use serde::Deserialize;
use std::time::Duration;

use crate::application::handlers::{
    BackoffPolicy, MetricsConfig, ReconcilerConfig, DEFAULT_FOUNDING_MEMBER_CAP,
};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_founding_member_cap")]
    pub founding_member_cap: u32,

    /// Window in which a second delivery of the same (subscription, status) is a duplicate
    #[serde(default = "default_delivery_freshness")]
    pub delivery_freshness_secs: u64,

    /// Comma-separated delays between account resolution attempts
    #[serde(default = "default_resolver_retry_delays")]
    pub resolver_retry_delays_ms: String,

    #[serde(default = "default_notification_timeout")]
    pub notification_timeout_secs: u64,

    #[serde(default = "default_metrics_cache_ttl")]
    pub metrics_cache_ttl_secs: u64,

    #[serde(default = "default_waterfall_lookback")]
    pub waterfall_lookback_months: u32,

    #[serde(default = "default_nrr_window")]
    pub nrr_window_days: i64,

    #[serde(default = "default_churn_window")]
    pub churn_window_days: i64,

    /// Zero disables the LTV:CAC ratio
    #[serde(default)]
    pub customer_acquisition_cost_cents: i64,
}

impl BillingConfig {
    /// Parsed retry delays; `None` if the list is malformed.
    pub fn retry_delays_ms(&self) -> Option<Vec<u64>> {
        let trimmed = self.resolver_retry_delays_ms.trim();
        if trimmed.is_empty() {
            return Some(Vec::new());
        }
        trimmed
            .split(',')
            .map(|d| d.trim().parse::<u64>().ok())
            .collect()
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        match self.retry_delays_ms() {
            Some(delays) => BackoffPolicy::from_millis(&delays),
            None => BackoffPolicy::default(),
        }
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            founding_member_cap: self.founding_member_cap,
            delivery_freshness: Duration::from_secs(self.delivery_freshness_secs),
            notification_timeout: Duration::from_secs(self.notification_timeout_secs),
        }
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            cache_ttl: Duration::from_secs(self.metrics_cache_ttl_secs),
            waterfall_lookback_months: self.waterfall_lookback_months,
            nrr_window_days: self.nrr_window_days,
            churn_window_days: self.churn_window_days,
            customer_acquisition_cost_cents: self.customer_acquisition_cost_cents,
            founding_member_cap: self.founding_member_cap,
            ..MetricsConfig::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.founding_member_cap == 0 {
            return Err(ValidationError::InvalidFoundingMemberCap);
        }
        if self.delivery_freshness_secs == 0 {
            return Err(ValidationError::InvalidBillingSetting("delivery_freshness_secs"));
        }
        if self.retry_delays_ms().is_none() {
            return Err(ValidationError::InvalidBillingSetting("resolver_retry_delays_ms"));
        }
        if self.notification_timeout_secs == 0 {
            return Err(ValidationError::InvalidBillingSetting("notification_timeout_secs"));
        }
        if self.waterfall_lookback_months == 0 || self.waterfall_lookback_months > 120 {
            return Err(ValidationError::InvalidBillingSetting("waterfall_lookback_months"));
        }
        if self.nrr_window_days <= 0 {
            return Err(ValidationError::InvalidBillingSetting("nrr_window_days"));
        }
        if self.churn_window_days <= 0 {
            return Err(ValidationError::InvalidBillingSetting("churn_window_days"));
        }
        if self.customer_acquisition_cost_cents < 0 {
            return Err(ValidationError::InvalidBillingSetting("customer_acquisition_cost_cents"));
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            founding_member_cap: default_founding_member_cap(),
            delivery_freshness_secs: default_delivery_freshness(),
            resolver_retry_delays_ms: default_resolver_retry_delays(),
            notification_timeout_secs: default_notification_timeout(),
            metrics_cache_ttl_secs: default_metrics_cache_ttl(),
            waterfall_lookback_months: default_waterfall_lookback(),
            nrr_window_days: default_nrr_window(),
            churn_window_days: default_churn_window(),
            customer_acquisition_cost_cents: 0,
        }
    }
}

fn default_founding_member_cap() -> u32 {
    DEFAULT_FOUNDING_MEMBER_CAP
}

fn default_delivery_freshness() -> u64 {
    300
}

fn default_resolver_retry_delays() -> String {
    "500,1500".to_string()
}

fn default_notification_timeout() -> u64 {
    5
}

fn default_metrics_cache_ttl() -> u64 {
    300
}

fn default_waterfall_lookback() -> u32 {
    12
}

fn default_nrr_window() -> i64 {
    90
}

fn default_churn_window() -> i64 {
    30
}
