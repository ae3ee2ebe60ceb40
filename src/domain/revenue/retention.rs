//! Net revenue retention.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::billing::{AccountSubscription, SubscriptionEvent};
use crate::domain::foundation::{Timestamp, UserId};

use super::replay::{chronological, mrr_after};

/// NRR over a cohort of accounts that were paying at window start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub window_start: Timestamp,
    pub cohort_size: usize,
    pub starting_mrr_cents: i64,
    pub current_mrr_cents: i64,
    /// `current / starting * 100`; absent when nobody was paying.
    pub nrr_percent: Option<f64>,
}

/// Computes NRR for the window beginning at `window_start`.
///
/// An account's starting MRR is priced from the `from` side of its first
/// state-changing entry inside the window. Accounts without such an entry
/// kept their plan the whole window, so their current MRR is also their
/// starting MRR.
pub fn net_revenue_retention(
    accounts: &[AccountSubscription],
    entries: &[SubscriptionEvent],
    window_start: Timestamp,
) -> RetentionReport {
    let mut first_in_window: HashMap<&UserId, &SubscriptionEvent> = HashMap::new();
    for entry in chronological(entries) {
        if entry.created_at.is_before(&window_start) || mrr_after(entry).is_none() {
            continue;
        }
        first_in_window.entry(&entry.user_id).or_insert(entry);
    }

    let mut cohort_size = 0;
    let mut starting_mrr_cents = 0;
    let mut current_mrr_cents = 0;

    for account in accounts {
        let starting = match first_in_window.get(&account.user_id) {
            Some(entry) => entry.from_plan().monthly_rate_cents(),
            None => account.monthly_rate_cents(),
        };
        if starting <= 0 {
            continue;
        }
        cohort_size += 1;
        starting_mrr_cents += starting;
        current_mrr_cents += account.monthly_rate_cents();
    }

    let nrr_percent = (starting_mrr_cents > 0)
        .then(|| current_mrr_cents as f64 / starting_mrr_cents as f64 * 100.0);

    RetentionReport {
        window_start,
        cohort_size,
        starting_mrr_cents,
        current_mrr_cents,
        nrr_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{
        metadata_keys, BillingPeriod, Plan, SubscriptionDetails, SubscriptionEventType,
        SubscriptionTier, TriggerSource,
    };
    use std::collections::BTreeMap;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::from_unix_secs(secs)
    }

    fn paying(user: &str, tier: SubscriptionTier) -> AccountSubscription {
        let mut account = AccountSubscription::new_free(UserId::new(user).unwrap(), ts(0));
        account
            .activate(
                &SubscriptionDetails {
                    subscription_ref: format!("sub_{}", user),
                    customer_ref: None,
                    metadata_user_id: None,
                    customer_email: None,
                    plan: Plan::new(tier, BillingPeriod::Monthly),
                    period_start: None,
                    period_end: None,
                },
                ts(1),
            )
            .unwrap();
        account
    }

    fn entry(
        user: &str,
        event_type: SubscriptionEventType,
        from: SubscriptionTier,
        to: SubscriptionTier,
        at: u64,
    ) -> SubscriptionEvent {
        let mut metadata = BTreeMap::new();
        metadata.insert(metadata_keys::PERIOD.to_string(), "monthly".to_string());
        metadata.insert(metadata_keys::PREVIOUS_PERIOD.to_string(), "monthly".to_string());
        SubscriptionEvent::record(
            UserId::new(user).unwrap(),
            event_type,
            from,
            to,
            TriggerSource::Webhook,
            metadata,
            ts(at),
        )
    }

    #[test]
    fn upgrade_mid_window_raises_nrr_above_100() {
        use SubscriptionTier::*;
        let accounts = vec![paying("u1", Family)];
        let entries = vec![
            entry("u1", SubscriptionEventType::SubscriptionCreated, Free, Pro, 100),
            entry("u1", SubscriptionEventType::SubscriptionUpdated, Pro, Family, 5_000),
        ];
        let report = net_revenue_retention(&accounts, &entries, ts(1_000));

        assert_eq!(report.starting_mrr_cents, 999);
        assert_eq!(report.current_mrr_cents, 1499);
        assert!(report.nrr_percent.unwrap() > 100.0);
    }

    #[test]
    fn accounts_without_window_events_keep_starting_mrr() {
        let accounts = vec![paying("u1", SubscriptionTier::Pro)];
        let report = net_revenue_retention(&accounts, &[], ts(1_000));
        assert_eq!(report.cohort_size, 1);
        assert_eq!(report.nrr_percent, Some(100.0));
    }

    #[test]
    fn accounts_acquired_in_window_are_excluded() {
        use SubscriptionTier::*;
        let accounts = vec![paying("u1", Pro)];
        let entries = vec![entry(
            "u1",
            SubscriptionEventType::SubscriptionCreated,
            Free,
            Pro,
            2_000,
        )];
        let report = net_revenue_retention(&accounts, &entries, ts(1_000));
        assert_eq!(report.cohort_size, 0);
        assert_eq!(report.nrr_percent, None);
    }

    #[test]
    fn churned_accounts_count_as_zero_current() {
        use SubscriptionTier::*;
        let mut churned = paying("u1", Pro);
        churned.cancel(ts(3_000)).unwrap();
        let accounts = vec![churned, paying("u2", Pro)];
        let entries = vec![entry(
            "u1",
            SubscriptionEventType::SubscriptionCanceled,
            Pro,
            Free,
            3_000,
        )];
        let report = net_revenue_retention(&accounts, &entries, ts(1_000));
        assert_eq!(report.cohort_size, 2);
        assert_eq!(report.nrr_percent, Some(50.0));
    }
}
