//! Payment processor configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashSet;

use crate::domain::billing::{BillingPeriod, Plan, ProductCatalog, SubscriptionTier};

use super::error::ValidationError;

/// Webhook secret and the processor product ids for each paid plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Shared secret for webhook HMAC signatures
    pub webhook_secret: SecretString,

    pub pro_monthly_product_id: Option<String>,
    pub pro_annual_product_id: Option<String>,
    pub family_monthly_product_id: Option<String>,
    pub family_annual_product_id: Option<String>,
}

impl PaymentConfig {
    fn products(&self) -> [(Option<&str>, Plan); 4] {
        [
            (
                self.pro_monthly_product_id.as_deref(),
                Plan::new(SubscriptionTier::Pro, BillingPeriod::Monthly),
            ),
            (
                self.pro_annual_product_id.as_deref(),
                Plan::new(SubscriptionTier::Pro, BillingPeriod::Annual),
            ),
            (
                self.family_monthly_product_id.as_deref(),
                Plan::new(SubscriptionTier::Family, BillingPeriod::Monthly),
            ),
            (
                self.family_annual_product_id.as_deref(),
                Plan::new(SubscriptionTier::Family, BillingPeriod::Annual),
            ),
        ]
    }

    /// Catalog of the configured product ids.
    pub fn product_catalog(&self) -> ProductCatalog {
        self.products()
            .into_iter()
            .filter_map(|(id, plan)| id.filter(|id| !id.is_empty()).map(|id| (id, plan)))
            .fold(ProductCatalog::new(), |catalog, (id, plan)| {
                catalog.with_product(id, plan)
            })
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"));
        }

        let mut seen = HashSet::new();
        for (id, _) in self.products() {
            if let Some(id) = id.filter(|id| !id.is_empty()) {
                if !seen.insert(id) {
                    return Err(ValidationError::DuplicateProductId(id.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            webhook_secret: SecretString::new(String::new()),
            pro_monthly_product_id: None,
            pro_annual_product_id: None,
            family_monthly_product_id: None,
            family_annual_product_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> PaymentConfig {
        PaymentConfig {
            webhook_secret: SecretString::new("whsec_test".to_string()),
            pro_monthly_product_id: Some("prod_pro_m".to_string()),
            pro_annual_product_id: Some("prod_pro_y".to_string()),
            family_monthly_product_id: Some("prod_fam_m".to_string()),
            family_annual_product_id: None,
        }
    }

    #[test]
    fn test_validation_missing_webhook_secret() {
        assert_eq!(
            PaymentConfig::default().validate(),
            Err(ValidationError::MissingRequired("PAYMENT__WEBHOOK_SECRET"))
        );
    }

    #[test]
    fn test_validation_duplicate_product_id() {
        let config = PaymentConfig {
            family_annual_product_id: Some("prod_pro_m".to_string()),
            ..configured()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateProductId("prod_pro_m".to_string()))
        );
    }

    #[test]
    fn test_product_catalog_maps_configured_ids() {
        let catalog = configured().product_catalog();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.lookup("prod_pro_y"),
            Some(Plan::new(SubscriptionTier::Pro, BillingPeriod::Annual))
        );
        assert_eq!(catalog.lookup("prod_fam_y"), None);
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(configured().validate().is_ok());
    }
}
