//! Account subscription aggregate.
//!
//! One row per user, owned by the reconciler. Every other feature area only
//! reads its `{tier, status}` through [`SubscriptionAccess`].
//!
//! # Design Decisions
//!
//! - **Free by default**: a user without a row reads as free/active
//! - **Money in cents**: rates come from the price table as i64 cents
//! - **Optimistic writes**: `version` is compared on update; the store bumps it

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, StateMachine, Timestamp, UserId};

use super::billing_event::SubscriptionDetails;
use super::pricing::Plan;
use super::status::SubscriptionStatus;
use super::tier::{BillingPeriod, SubscriptionTier};

/// Read contract for feature gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionAccess {
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
}

impl SubscriptionAccess {
    /// Access level of a user with no subscription row.
    pub fn free() -> Self {
        Self {
            tier: SubscriptionTier::Free,
            status: SubscriptionStatus::Active,
        }
    }
}

/// Result of the idempotency guard for `active`-type events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationCheck {
    /// Same subscription, already active on the same plan and bounds.
    Duplicate,
    /// Same subscription and plan with a later period end.
    Renewal,
    /// Same active subscription moved to a different plan.
    PlanChange,
    /// New subscription or reactivation.
    Activate,
}

/// Result of the guard for cancellation-type events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationCheck {
    Apply,
    AlreadyCanceled,
    /// The account is active on a different subscription.
    ForeignSubscription,
}

/// Before/after snapshot of one applied state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from_plan: Plan,
    pub from_status: SubscriptionStatus,
    pub to_plan: Plan,
    pub to_status: SubscriptionStatus,
}

impl Transition {
    /// Monthly recurring revenue before the change, in cents.
    pub fn from_mrr_cents(&self) -> i64 {
        effective_rate(self.from_plan, self.from_status)
    }

    /// Monthly recurring revenue after the change, in cents.
    pub fn to_mrr_cents(&self) -> i64 {
        effective_rate(self.to_plan, self.to_status)
    }
}

fn effective_rate(plan: Plan, status: SubscriptionStatus) -> i64 {
    match status {
        SubscriptionStatus::Active => plan.monthly_rate_cents(),
        SubscriptionStatus::Canceled => 0,
    }
}

/// A user's subscription projection.
///
/// # Invariants
///
/// - `user_id` is unique (one row per user)
/// - `founding_member_number` is set iff `is_founding_member`
/// - Canceled accounts are on the free tier with no subscription reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSubscription {
    pub user_id: UserId,
    pub tier: SubscriptionTier,
    pub period: BillingPeriod,
    pub status: SubscriptionStatus,
    pub external_customer_ref: Option<String>,
    pub external_subscription_ref: Option<String>,
    pub is_founding_member: bool,
    pub founding_member_number: Option<u32>,
    pub started_at: Option<Timestamp>,
    pub ends_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Write counter for optimistic concurrency.
    pub version: u64,
}

impl AccountSubscription {
    /// Creates the default free row for a user.
    pub fn new_free(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            tier: SubscriptionTier::Free,
            period: BillingPeriod::Monthly,
            status: SubscriptionStatus::Active,
            external_customer_ref: None,
            external_subscription_ref: None,
            is_founding_member: false,
            founding_member_number: None,
            started_at: None,
            ends_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn plan(&self) -> Plan {
        Plan::new(self.tier, self.period)
    }

    /// True if the account contributes recurring revenue.
    pub fn is_paying(&self) -> bool {
        self.status == SubscriptionStatus::Active && self.tier.is_paid()
    }

    /// Current monthly recurring revenue in cents.
    pub fn monthly_rate_cents(&self) -> i64 {
        if self.is_paying() {
            self.plan().monthly_rate_cents()
        } else {
            0
        }
    }

    pub fn access(&self) -> SubscriptionAccess {
        SubscriptionAccess {
            tier: self.tier,
            status: self.status,
        }
    }

    /// Records the processor's customer reference. Returns true if it changed.
    pub fn bind_customer(&mut self, customer_ref: &str, now: Timestamp) -> bool {
        if self.external_customer_ref.as_deref() == Some(customer_ref) {
            return false;
        }
        self.external_customer_ref = Some(customer_ref.to_string());
        self.updated_at = now;
        true
    }

    // ════════════════════════════════════════════════════════════════════════
    // Idempotency guards
    // ════════════════════════════════════════════════════════════════════════

    /// Classifies an incoming `active`-type event against the current row.
    pub fn check_activation(&self, details: &SubscriptionDetails) -> ActivationCheck {
        let same_subscription =
            self.external_subscription_ref.as_deref() == Some(details.subscription_ref.as_str());

        if !same_subscription || self.status != SubscriptionStatus::Active {
            return ActivationCheck::Activate;
        }
        if self.plan() != details.plan {
            return ActivationCheck::PlanChange;
        }
        if self.extends_period(details.period_end) {
            ActivationCheck::Renewal
        } else {
            ActivationCheck::Duplicate
        }
    }

    /// True if a `subscription_updated` event would change nothing.
    pub fn is_duplicate_update(&self, details: &SubscriptionDetails) -> bool {
        self.status == SubscriptionStatus::Active
            && self.external_subscription_ref.as_deref() == Some(details.subscription_ref.as_str())
            && self.plan() == details.plan
            && details.period_start.map_or(true, |s| Some(s) == self.started_at)
            && details.period_end.map_or(true, |e| Some(e) == self.ends_at)
    }

    /// Classifies an incoming cancellation against the current row.
    pub fn check_cancellation(&self, subscription_ref: &str) -> CancellationCheck {
        match self.status {
            SubscriptionStatus::Canceled => CancellationCheck::AlreadyCanceled,
            SubscriptionStatus::Active => match self.external_subscription_ref.as_deref() {
                Some(current) if current != subscription_ref => {
                    CancellationCheck::ForeignSubscription
                }
                // A free row with no subscription has nothing to cancel.
                None if !self.tier.is_paid() => CancellationCheck::AlreadyCanceled,
                _ => CancellationCheck::Apply,
            },
        }
    }

    fn extends_period(&self, period_end: Option<Timestamp>) -> bool {
        match (period_end, self.ends_at) {
            (Some(incoming), Some(stored)) => incoming.is_after(&stored),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // State transitions
    // ════════════════════════════════════════════════════════════════════════

    /// Moves the account to `active` on the event's plan.
    ///
    /// Used for new subscriptions, reactivations, renewals, and plan changes.
    pub fn activate(
        &mut self,
        details: &SubscriptionDetails,
        now: Timestamp,
    ) -> Result<Transition, DomainError> {
        let before = self.snapshot();
        let status = self
            .status
            .transition_to(SubscriptionStatus::Active)
            .map_err(|e| DomainError::new(ErrorCode::InvalidStateTransition, e.to_string()))?;

        self.status = status;
        self.apply_details(details, now);
        Ok(self.transition_from(before))
    }

    /// Applies a `subscription_updated` event to an active account.
    pub fn change_plan(
        &mut self,
        details: &SubscriptionDetails,
        now: Timestamp,
    ) -> Result<Transition, DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("cannot change plan of a {} subscription", self.status),
            ));
        }
        let before = self.snapshot();
        self.apply_details(details, now);
        Ok(self.transition_from(before))
    }

    /// Cancels the subscription: free tier, reference cleared.
    ///
    /// The billing period is kept so the ledger can price the churned plan.
    pub fn cancel(&mut self, now: Timestamp) -> Result<Transition, DomainError> {
        let before = self.snapshot();
        self.status = self
            .status
            .transition_to(SubscriptionStatus::Canceled)
            .map_err(|e| DomainError::new(ErrorCode::InvalidStateTransition, e.to_string()))?;
        self.tier = SubscriptionTier::Free;
        self.external_subscription_ref = None;
        self.updated_at = now;
        Ok(self.transition_from(before))
    }

    /// Records a founding-member grant.
    pub fn grant_founding_member(&mut self, number: u32) {
        self.is_founding_member = true;
        self.founding_member_number = Some(number);
    }

    fn apply_details(&mut self, details: &SubscriptionDetails, now: Timestamp) {
        self.tier = details.plan.tier;
        self.period = details.plan.period;
        self.external_subscription_ref = Some(details.subscription_ref.clone());
        if let Some(customer_ref) = details.customer_ref.as_deref() {
            self.external_customer_ref = Some(customer_ref.to_string());
        }
        if let Some(start) = details.period_start {
            self.started_at = Some(start);
        } else if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if let Some(end) = details.period_end {
            self.ends_at = Some(end);
        }
        self.updated_at = now;
    }

    fn snapshot(&self) -> (Plan, SubscriptionStatus) {
        (self.plan(), self.status)
    }

    fn transition_from(&self, before: (Plan, SubscriptionStatus)) -> Transition {
        Transition {
            from_plan: before.0,
            from_status: before.1,
            to_plan: self.plan(),
            to_status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::from_unix_secs(secs)
    }

    fn details(tier: SubscriptionTier, period: BillingPeriod, end: u64) -> SubscriptionDetails {
        SubscriptionDetails {
            subscription_ref: "sub_1".to_string(),
            customer_ref: Some("cus_1".to_string()),
            metadata_user_id: None,
            customer_email: None,
            plan: Plan::new(tier, period),
            period_start: Some(ts(end - 1_000)),
            period_end: Some(ts(end)),
        }
    }

    fn active_pro() -> AccountSubscription {
        let mut account = AccountSubscription::new_free(user(), ts(0));
        account
            .activate(
                &details(SubscriptionTier::Pro, BillingPeriod::Monthly, 10_000),
                ts(1),
            )
            .unwrap();
        account
    }

    // ══════════════════════════════════════════════════════════════
    // Construction and Read Contract
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn new_account_reads_as_free_active() {
        let account = AccountSubscription::new_free(user(), ts(0));
        assert_eq!(account.access(), SubscriptionAccess::free());
        assert_eq!(account.monthly_rate_cents(), 0);
        assert_eq!(account.version, 0);
    }

    #[test]
    fn bind_customer_reports_change() {
        let mut account = AccountSubscription::new_free(user(), ts(0));
        assert!(account.bind_customer("cus_1", ts(5)));
        assert!(!account.bind_customer("cus_1", ts(6)));
        assert_eq!(account.updated_at, ts(5));
    }

    // ══════════════════════════════════════════════════════════════
    // Activation
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn activate_sets_plan_bounds_and_refs() {
        let account = active_pro();
        assert_eq!(account.status, SubscriptionStatus::Active);
        assert_eq!(account.tier, SubscriptionTier::Pro);
        assert_eq!(account.external_subscription_ref.as_deref(), Some("sub_1"));
        assert_eq!(account.external_customer_ref.as_deref(), Some("cus_1"));
        assert_eq!(account.ends_at, Some(ts(10_000)));
        assert_eq!(account.monthly_rate_cents(), 999);
    }

    #[test]
    fn activation_transition_prices_both_sides() {
        let mut account = AccountSubscription::new_free(user(), ts(0));
        let transition = account
            .activate(
                &details(SubscriptionTier::Family, BillingPeriod::Annual, 10_000),
                ts(1),
            )
            .unwrap();
        assert_eq!(transition.from_mrr_cents(), 0);
        assert_eq!(transition.to_mrr_cents(), 1250);
    }

    #[test]
    fn same_subscription_same_bounds_is_duplicate() {
        let account = active_pro();
        let check =
            account.check_activation(&details(SubscriptionTier::Pro, BillingPeriod::Monthly, 10_000));
        assert_eq!(check, ActivationCheck::Duplicate);
    }

    #[test]
    fn earlier_period_end_is_duplicate() {
        let account = active_pro();
        let check =
            account.check_activation(&details(SubscriptionTier::Pro, BillingPeriod::Monthly, 9_000));
        assert_eq!(check, ActivationCheck::Duplicate);
    }

    #[test]
    fn later_period_end_is_renewal() {
        let account = active_pro();
        let check =
            account.check_activation(&details(SubscriptionTier::Pro, BillingPeriod::Monthly, 20_000));
        assert_eq!(check, ActivationCheck::Renewal);
    }

    #[test]
    fn different_plan_on_same_subscription_is_plan_change() {
        let account = active_pro();
        let check = account
            .check_activation(&details(SubscriptionTier::Family, BillingPeriod::Monthly, 10_000));
        assert_eq!(check, ActivationCheck::PlanChange);
    }

    #[test]
    fn canceled_account_reactivates() {
        let mut account = active_pro();
        account.cancel(ts(2)).unwrap();
        let mut incoming = details(SubscriptionTier::Pro, BillingPeriod::Monthly, 10_000);
        incoming.subscription_ref = "sub_2".to_string();
        assert_eq!(account.check_activation(&incoming), ActivationCheck::Activate);

        let transition = account.activate(&incoming, ts(3)).unwrap();
        assert_eq!(transition.from_status, SubscriptionStatus::Canceled);
        assert_eq!(transition.to_status, SubscriptionStatus::Active);
    }

    // ══════════════════════════════════════════════════════════════
    // Updates
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn identical_update_is_duplicate() {
        let account = active_pro();
        assert!(account
            .is_duplicate_update(&details(SubscriptionTier::Pro, BillingPeriod::Monthly, 10_000)));
        assert!(!account
            .is_duplicate_update(&details(SubscriptionTier::Family, BillingPeriod::Monthly, 10_000)));
    }

    #[test]
    fn change_plan_requires_active() {
        let mut account = active_pro();
        account.cancel(ts(2)).unwrap();
        let err = account
            .change_plan(
                &details(SubscriptionTier::Family, BillingPeriod::Monthly, 10_000),
                ts(3),
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[test]
    fn downgrade_transition_reduces_mrr() {
        let mut account = AccountSubscription::new_free(user(), ts(0));
        account
            .activate(
                &details(SubscriptionTier::Family, BillingPeriod::Monthly, 10_000),
                ts(1),
            )
            .unwrap();
        let transition = account
            .change_plan(
                &details(SubscriptionTier::Pro, BillingPeriod::Monthly, 10_000),
                ts(2),
            )
            .unwrap();
        assert!(transition.to_mrr_cents() < transition.from_mrr_cents());
    }

    // ══════════════════════════════════════════════════════════════
    // Cancellation
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn cancel_moves_to_free_and_clears_reference() {
        let mut account = active_pro();
        let transition = account.cancel(ts(2)).unwrap();
        assert_eq!(account.status, SubscriptionStatus::Canceled);
        assert_eq!(account.tier, SubscriptionTier::Free);
        assert_eq!(account.external_subscription_ref, None);
        assert_eq!(transition.from_mrr_cents(), 999);
        assert_eq!(transition.to_mrr_cents(), 0);
    }

    #[test]
    fn second_cancellation_is_detected() {
        let mut account = active_pro();
        account.cancel(ts(2)).unwrap();
        assert_eq!(
            account.check_cancellation("sub_1"),
            CancellationCheck::AlreadyCanceled
        );
        assert!(account.cancel(ts(3)).is_err());
    }

    #[test]
    fn cancellation_of_other_subscription_is_foreign() {
        let account = active_pro();
        assert_eq!(
            account.check_cancellation("sub_old"),
            CancellationCheck::ForeignSubscription
        );
        assert_eq!(account.check_cancellation("sub_1"), CancellationCheck::Apply);
    }

    #[test]
    fn founding_grant_sets_both_fields() {
        let mut account = active_pro();
        account.grant_founding_member(7);
        assert!(account.is_founding_member);
        assert_eq!(account.founding_member_number, Some(7));
    }
}
