//! Authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Shortest admin secret accepted in production (HS256 key size).
pub const MIN_ADMIN_SECRET_BYTES: usize = 32;

/// Admin session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret that signs admin session tokens
    pub admin_jwt_secret: SecretString,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// Production requires a secret of at least [`MIN_ADMIN_SECRET_BYTES`].
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let secret = self.admin_jwt_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__ADMIN_JWT_SECRET"));
        }
        if *environment == Environment::Production && secret.len() < MIN_ADMIN_SECRET_BYTES {
            return Err(ValidationError::WeakAdminSecret(MIN_ADMIN_SECRET_BYTES));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_jwt_secret: SecretString::new(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret(secret: &str) -> AuthConfig {
        AuthConfig {
            admin_jwt_secret: SecretString::new(secret.to_string()),
        }
    }

    #[test]
    fn test_validation_missing_secret() {
        assert!(AuthConfig::default()
            .validate(&Environment::Development)
            .is_err());
    }

    #[test]
    fn test_short_secret_allowed_outside_production() {
        let config = with_secret("dev-secret");
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::WeakAdminSecret(MIN_ADMIN_SECRET_BYTES))
        );
    }

    #[test]
    fn test_long_secret_valid_in_production() {
        let config = with_secret(&"k".repeat(MIN_ADMIN_SECRET_BYTES));
        assert!(config.validate(&Environment::Production).is_ok());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let config = with_secret("super-secret-value");
        assert!(!format!("{:?}", config).contains("super-secret-value"));
    }
}
