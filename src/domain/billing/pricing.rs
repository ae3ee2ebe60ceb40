//! Price table.
//!
//! All monetary values are integer cents. Annual plans contribute their
//! monthly-equivalent rate (yearly price / 12, rounded to the nearest cent).

use serde::{Deserialize, Serialize};

use super::{BillingPeriod, SubscriptionTier};

const PRO_MONTHLY_CENTS: i64 = 999;
const PRO_ANNUAL_CENTS: i64 = 9_999;
const FAMILY_MONTHLY_CENTS: i64 = 1_499;
const FAMILY_ANNUAL_CENTS: i64 = 14_999;

/// A tier together with its billing cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plan {
    pub tier: SubscriptionTier,
    pub period: BillingPeriod,
}

impl Plan {
    pub fn new(tier: SubscriptionTier, period: BillingPeriod) -> Self {
        Self { tier, period }
    }

    /// The free plan every account starts on.
    pub fn free() -> Self {
        Self::new(SubscriptionTier::Free, BillingPeriod::Monthly)
    }

    /// Effective monthly recurring rate in cents.
    pub fn monthly_rate_cents(&self) -> i64 {
        monthly_rate_cents(self.tier, self.period)
    }

    /// Amount charged per billing cycle in cents.
    pub fn list_price_cents(&self) -> i64 {
        match (self.tier, self.period) {
            (SubscriptionTier::Free, _) => 0,
            (SubscriptionTier::Pro, BillingPeriod::Monthly) => PRO_MONTHLY_CENTS,
            (SubscriptionTier::Pro, BillingPeriod::Annual) => PRO_ANNUAL_CENTS,
            (SubscriptionTier::Family, BillingPeriod::Monthly) => FAMILY_MONTHLY_CENTS,
            (SubscriptionTier::Family, BillingPeriod::Annual) => FAMILY_ANNUAL_CENTS,
        }
    }
}

/// Monthly-equivalent price lookup.
pub fn monthly_rate_cents(tier: SubscriptionTier, period: BillingPeriod) -> i64 {
    let list = Plan::new(tier, period).list_price_cents();
    match period {
        BillingPeriod::Monthly => list,
        // Integer rounding half-up of list / 12.
        BillingPeriod::Annual => (list + 6) / 12,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_has_no_revenue() {
        assert_eq!(Plan::free().monthly_rate_cents(), 0);
        assert_eq!(
            monthly_rate_cents(SubscriptionTier::Free, BillingPeriod::Annual),
            0
        );
    }

    #[test]
    fn monthly_plans_use_list_price() {
        assert_eq!(
            monthly_rate_cents(SubscriptionTier::Pro, BillingPeriod::Monthly),
            999
        );
        assert_eq!(
            monthly_rate_cents(SubscriptionTier::Family, BillingPeriod::Monthly),
            1499
        );
    }

    #[test]
    fn annual_plans_contribute_discounted_monthly_equivalent() {
        assert_eq!(
            monthly_rate_cents(SubscriptionTier::Pro, BillingPeriod::Annual),
            833
        );
        assert_eq!(
            monthly_rate_cents(SubscriptionTier::Family, BillingPeriod::Annual),
            1250
        );
    }

    #[test]
    fn annual_is_cheaper_per_month_than_monthly() {
        for tier in [SubscriptionTier::Pro, SubscriptionTier::Family] {
            assert!(
                monthly_rate_cents(tier, BillingPeriod::Annual)
                    < monthly_rate_cents(tier, BillingPeriod::Monthly)
            );
        }
    }
}
