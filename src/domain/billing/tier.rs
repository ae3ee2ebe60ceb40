//! Subscription tier and billing period definitions.

use serde::{Deserialize, Serialize};

/// Subscription tier gating household features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    /// Default tier for every household; no recurring revenue.
    Free,
    /// Single-household paid tier.
    Pro,
    /// Multi-member household paid tier.
    Family,
}

impl SubscriptionTier {
    /// Returns true if this tier is a paid tier.
    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionTier::Free)
    }

    /// Numeric rank used to classify upgrades and downgrades.
    pub fn rank(&self) -> u8 {
        match self {
            SubscriptionTier::Free => 0,
            SubscriptionTier::Pro => 1,
            SubscriptionTier::Family => 2,
        }
    }

    /// Wire representation, as stored in the ledger and the projection.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Family => "family",
        }
    }

    /// Parses the wire representation (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(SubscriptionTier::Free),
            "pro" => Some(SubscriptionTier::Pro),
            "family" => Some(SubscriptionTier::Family),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Billing cadence of a paid plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingPeriod {
    #[default]
    Monthly,
    Annual,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Annual => "annual",
        }
    }

    /// Parses the wire representation; accepts `yearly` as an alias of `annual`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Some(BillingPeriod::Monthly),
            "annual" | "yearly" | "year" => Some(BillingPeriod::Annual),
            _ => None,
        }
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_is_not_paid() {
        assert!(!SubscriptionTier::Free.is_paid());
        assert!(SubscriptionTier::Pro.is_paid());
        assert!(SubscriptionTier::Family.is_paid());
    }

    #[test]
    fn family_outranks_pro() {
        assert!(SubscriptionTier::Family.rank() > SubscriptionTier::Pro.rank());
        assert!(SubscriptionTier::Pro.rank() > SubscriptionTier::Free.rank());
    }

    #[test]
    fn tier_parse_is_case_insensitive() {
        assert_eq!(SubscriptionTier::parse("FAMILY"), Some(SubscriptionTier::Family));
        assert_eq!(SubscriptionTier::parse(" pro "), Some(SubscriptionTier::Pro));
        assert_eq!(SubscriptionTier::parse("gold"), None);
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&SubscriptionTier::Family).unwrap();
        assert_eq!(json, "\"family\"");
    }

    #[test]
    fn period_accepts_yearly_alias() {
        assert_eq!(BillingPeriod::parse("yearly"), Some(BillingPeriod::Annual));
        assert_eq!(BillingPeriod::parse("monthly"), Some(BillingPeriod::Monthly));
        assert_eq!(BillingPeriod::parse("weekly"), None);
    }
}
