//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `HOUSEHOLD_BILLING`
//! prefix and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use household_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod auth;
mod billing;
mod database;
mod email;
mod error;
mod payment;
mod rate_limit;
mod redis;
mod server;

pub use auth::{AuthConfig, MIN_ADMIN_SECRET_BYTES};
pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use email::EmailConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use rate_limit::RateLimitSettings;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "HOUSEHOLD_BILLING";

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// Optional; the metrics cache is in-process without it
    #[serde(default)]
    pub redis: RedisConfig,

    pub auth: AuthConfig,

    pub payment: PaymentConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub billing: BillingConfig,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `HOUSEHOLD_BILLING` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `HOUSEHOLD_BILLING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `HOUSEHOLD_BILLING__BILLING__FOUNDING_MEMBER_CAP=500` -> `billing.founding_member_cap = 500`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values do
    /// not parse.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.auth.validate(&self.server.environment)?;
        self.payment.validate()?;
        self.email.validate()?;
        self.billing.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [(&str, &str); 4] = [
        ("HOUSEHOLD_BILLING__DATABASE__URL", "postgresql://test@localhost/test"),
        ("HOUSEHOLD_BILLING__AUTH__ADMIN_JWT_SECRET", "admin-dev-secret"),
        ("HOUSEHOLD_BILLING__PAYMENT__WEBHOOK_SECRET", "whsec_test"),
        ("HOUSEHOLD_BILLING__PAYMENT__PRO_MONTHLY_PRODUCT_ID", "prod_pro_m"),
    ];

    const OPTIONAL: [&str; 4] = [
        "HOUSEHOLD_BILLING__SERVER__PORT",
        "HOUSEHOLD_BILLING__SERVER__ENVIRONMENT",
        "HOUSEHOLD_BILLING__BILLING__FOUNDING_MEMBER_CAP",
        "HOUSEHOLD_BILLING__RATE_LIMIT__WEBHOOK_REQUESTS_PER_MINUTE",
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).expect("config loads");

        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.payment.webhook_secret.expose_secret(), "whsec_test");
        assert_eq!(config.payment.product_catalog().len(), 1);
        assert!(!config.redis.is_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.billing.founding_member_cap, 1000);
        assert_eq!(config.rate_limit.webhook_requests_per_minute, 120);
    }

    #[test]
    fn test_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("HOUSEHOLD_BILLING__SERVER__PORT", "3000"),
            ("HOUSEHOLD_BILLING__BILLING__FOUNDING_MEMBER_CAP", "250"),
            ("HOUSEHOLD_BILLING__RATE_LIMIT__WEBHOOK_REQUESTS_PER_MINUTE", "30"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.billing.founding_member_cap, 250);
        assert_eq!(config.rate_limit.webhook_requests_per_minute, 30);
    }

    #[test]
    fn test_production_rejects_short_admin_secret() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("HOUSEHOLD_BILLING__SERVER__ENVIRONMENT", "production")]).unwrap();

        assert!(config.is_production());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::WeakAdminSecret(_))
        ));
    }

    #[test]
    fn test_missing_database_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("HOUSEHOLD_BILLING__AUTH__ADMIN_JWT_SECRET", "x");
        env::set_var("HOUSEHOLD_BILLING__PAYMENT__WEBHOOK_SECRET", "y");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_err());
    }
}
