//! Point-in-time view of the account projection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::billing::AccountSubscription;

/// Sum of current MRR over active, non-free accounts, in cents.
pub fn current_mrr_cents(accounts: &[AccountSubscription]) -> i64 {
    accounts.iter().map(AccountSubscription::monthly_rate_cents).sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub current_mrr_cents: i64,
    pub total_accounts: usize,
    pub paying_accounts: usize,
    pub by_tier: BTreeMap<String, usize>,
    pub by_period: BTreeMap<String, usize>,
    pub by_status: BTreeMap<String, usize>,
}

impl SubscriptionSnapshot {
    pub fn from_accounts(accounts: &[AccountSubscription]) -> Self {
        let mut by_tier = BTreeMap::new();
        let mut by_period = BTreeMap::new();
        let mut by_status = BTreeMap::new();

        for account in accounts {
            *by_tier.entry(account.tier.to_string()).or_insert(0) += 1;
            *by_status.entry(account.status.to_string()).or_insert(0) += 1;
            if account.is_paying() {
                *by_period.entry(account.period.to_string()).or_insert(0) += 1;
            }
        }

        Self {
            current_mrr_cents: current_mrr_cents(accounts),
            total_accounts: accounts.len(),
            paying_accounts: accounts.iter().filter(|a| a.is_paying()).count(),
            by_tier,
            by_period,
            by_status,
        }
    }
}
