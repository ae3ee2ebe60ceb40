//! Revenue by signup cohort.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::billing::AccountSubscription;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortRevenue {
    /// First day of the month the account row was created.
    pub cohort: NaiveDate,
    pub accounts: usize,
    pub mrr_cents: i64,
}

/// Groups paying accounts by creation month, oldest cohort first.
pub fn revenue_by_cohort(accounts: &[AccountSubscription]) -> Vec<CohortRevenue> {
    let mut cohorts: BTreeMap<NaiveDate, CohortRevenue> = BTreeMap::new();

    for account in accounts.iter().filter(|a| a.is_paying()) {
        let month = account.created_at.month_start();
        let cohort = cohorts.entry(month).or_insert(CohortRevenue {
            cohort: month,
            accounts: 0,
            mrr_cents: 0,
        });
        cohort.accounts += 1;
        cohort.mrr_cents += account.monthly_rate_cents();
    }

    cohorts.into_values().collect()
}
