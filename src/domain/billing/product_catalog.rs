//! Mapping from payment-processor product ids to plans.

use std::collections::HashMap;

use super::pricing::Plan;

/// Configured product id → plan lookup.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: HashMap<String, Plan>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a product id. Empty ids are skipped so unset config is harmless.
    pub fn with_product(mut self, product_id: impl Into<String>, plan: Plan) -> Self {
        let product_id = product_id.into();
        if !product_id.trim().is_empty() {
            self.products.insert(product_id, plan);
        }
        self
    }

    pub fn lookup(&self, product_id: &str) -> Option<Plan> {
        self.products.get(product_id).copied()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{BillingPeriod, SubscriptionTier};

    #[test]
    fn lookup_returns_registered_plan() {
        let plan = Plan::new(SubscriptionTier::Family, BillingPeriod::Annual);
        let catalog = ProductCatalog::new().with_product("prod_fam_y", plan);
        assert_eq!(catalog.lookup("prod_fam_y"), Some(plan));
        assert_eq!(catalog.lookup("prod_other"), None);
    }

    #[test]
    fn empty_product_ids_are_skipped() {
        let catalog = ProductCatalog::new().with_product("", Plan::free());
        assert!(catalog.is_empty());
    }
}
