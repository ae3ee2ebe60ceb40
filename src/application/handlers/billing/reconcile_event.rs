//! ReconcileEventHandler - applies a normalized billing event to the account projection.
//!
//! # Write protocol
//!
//! 1. Resolve the account
//! 2. Run the projection guard (duplicate / renewal / plan change / activate)
//! 3. Claim the delivery record for new activations and cancellations
//! 4. Claim a founding-member slot when eligible
//! 5. Append to the ledger and write the projection (version compare-and-set)
//!    in one repository operation; neither is kept if the other fails
//! 6. Send notifications under a timeout; failures are logged only
//!
//! A failed projection write releases the delivery claim so the redelivered
//! event is not mistaken for a duplicate. A claim left behind by an abandoned
//! delivery answers `DeliveryInFlight` until it goes stale, so the processor
//! keeps redelivering instead of the event being acknowledged unapplied.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::billing::{
    metadata_keys, AccountSubscription, ActivationCheck, BillingEvent, CancellationCheck,
    CancellationDetails, SubscriptionDetails, SubscriptionEvent, SubscriptionStatus,
    Transition, TriggerSource, WebhookError,
};
use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    AppendOutcome, ClaimOutcome, DeliveryKey, DeliveryRecordStore, FoundingMemberSlots,
    Notification, NotificationSender, SubscriptionLedger, SubscriptionRepository,
    DEFAULT_DELIVERY_FRESHNESS,
};

use super::resolve_account::AccountResolver;

/// Default cap on founding-member numbers.
pub const DEFAULT_FOUNDING_MEMBER_CAP: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub founding_member_cap: u32,
    pub delivery_freshness: Duration,
    pub notification_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            founding_member_cap: DEFAULT_FOUNDING_MEMBER_CAP,
            delivery_freshness: DEFAULT_DELIVERY_FRESHNESS,
            notification_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of reconciling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// State (or the ledger) changed.
    Applied {
        user_id: UserId,
        transition: Transition,
        founding_member_number: Option<u32>,
    },
    /// Redelivery of an event that was already applied.
    Duplicate { user_id: UserId },
    /// Nothing to apply.
    Ignored { reason: String },
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied { .. } => "applied",
            ReconcileOutcome::Duplicate { .. } => "duplicate",
            ReconcileOutcome::Ignored { .. } => "ignored",
        }
    }

    fn ignored(reason: impl Into<String>) -> Self {
        ReconcileOutcome::Ignored {
            reason: reason.into(),
        }
    }
}

pub struct ReconcileEventHandler {
    resolver: AccountResolver,
    repository: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn SubscriptionLedger>,
    founding_slots: Arc<dyn FoundingMemberSlots>,
    deliveries: Arc<dyn DeliveryRecordStore>,
    notifier: Arc<dyn NotificationSender>,
    config: ReconcilerConfig,
}

impl ReconcileEventHandler {
    pub fn new(
        resolver: AccountResolver,
        repository: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn SubscriptionLedger>,
        founding_slots: Arc<dyn FoundingMemberSlots>,
        deliveries: Arc<dyn DeliveryRecordStore>,
        notifier: Arc<dyn NotificationSender>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            resolver,
            repository,
            ledger,
            founding_slots,
            deliveries,
            notifier,
            config,
        }
    }

    pub async fn handle(
        &self,
        event: &BillingEvent,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let resolved = self.resolver.resolve(event, now).await?;
        let account = resolved.account;

        tracing::debug!(
            event_type = event.event_type().as_str(),
            user_id = %account.user_id,
            path = resolved.path.as_str(),
            "Account resolved"
        );

        let outcome = match event {
            BillingEvent::CheckoutSucceeded(_) => self.record_checkout(event, account, now).await?,
            BillingEvent::SubscriptionCreated(details) | BillingEvent::SubscriptionActive(details) => {
                self.activate(event, details, account, now).await?
            }
            BillingEvent::SubscriptionUpdated(details) => {
                self.update_plan(event, details, account, now).await?
            }
            BillingEvent::SubscriptionCanceled(details)
            | BillingEvent::SubscriptionRevoked(details)
            | BillingEvent::OrderRefunded(details) => {
                self.cancel(event, details, account, now).await?
            }
        };

        tracing::info!(
            event_type = event.event_type().as_str(),
            subscription_ref = event.subscription_ref().unwrap_or("-"),
            outcome = outcome.as_str(),
            "Billing event reconciled"
        );
        Ok(outcome)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event handlers
    // ════════════════════════════════════════════════════════════════════════════

    async fn record_checkout(
        &self,
        event: &BillingEvent,
        account: AccountSubscription,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let entry = self.ledger_entry(event, &account, &account, BTreeMap::new(), now);
        match self.ledger.append(&entry).await? {
            AppendOutcome::AlreadyRecorded => Ok(ReconcileOutcome::Duplicate {
                user_id: account.user_id,
            }),
            AppendOutcome::Appended => Ok(ReconcileOutcome::Applied {
                transition: unchanged(&account),
                founding_member_number: None,
                user_id: account.user_id,
            }),
        }
    }

    async fn activate(
        &self,
        event: &BillingEvent,
        details: &SubscriptionDetails,
        mut account: AccountSubscription,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let check = account.check_activation(details);
        if check == ActivationCheck::Duplicate {
            return Ok(ReconcileOutcome::Duplicate {
                user_id: account.user_id,
            });
        }

        let claim = if check == ActivationCheck::Activate {
            let key = DeliveryKey::new(&details.subscription_ref, SubscriptionStatus::Active);
            self.claim_delivery(&key, now).await?;
            Some(key)
        } else {
            None
        };

        let before = account.clone();
        let transition = match account.activate(details, now) {
            Ok(transition) => transition,
            Err(e) => {
                self.release_claim(claim.as_ref()).await;
                return Err(e.into());
            }
        };

        let mut founding_member_number = None;
        if check == ActivationCheck::Activate
            && !account.is_founding_member
            && details.plan.tier.is_paid()
        {
            match self
                .founding_slots
                .claim(&account.user_id, self.config.founding_member_cap)
                .await
            {
                Ok(Some(number)) => {
                    account.grant_founding_member(number);
                    founding_member_number = Some(number);
                }
                Ok(None) => {
                    tracing::info!(
                        user_id = %account.user_id,
                        cap = self.config.founding_member_cap,
                        "Founding member slots exhausted"
                    );
                }
                Err(e) => {
                    self.release_claim(claim.as_ref()).await;
                    return Err(e.into());
                }
            }
        }

        self.commit(event, &before, &mut account, BTreeMap::new(), claim.as_ref(), now)
            .await?;

        if check == ActivationCheck::Activate && details.plan.tier.is_paid() {
            self.notify(Notification::Welcome {
                user_id: account.user_id.clone(),
                email: event.customer_email().map(String::from),
                tier: account.tier,
                founding_member_number,
            })
            .await;
        }

        Ok(ReconcileOutcome::Applied {
            user_id: account.user_id,
            transition,
            founding_member_number,
        })
    }

    async fn update_plan(
        &self,
        event: &BillingEvent,
        details: &SubscriptionDetails,
        mut account: AccountSubscription,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, WebhookError> {
        if account.status == SubscriptionStatus::Canceled {
            return Ok(ReconcileOutcome::ignored(
                "subscription_updated for a canceled account",
            ));
        }
        if let Some(current) = account.external_subscription_ref.as_deref() {
            if current != details.subscription_ref {
                return Ok(ReconcileOutcome::ignored(
                    "subscription_updated for a replaced subscription",
                ));
            }
        }
        if account.is_duplicate_update(details) {
            return Ok(ReconcileOutcome::Duplicate {
                user_id: account.user_id,
            });
        }

        let before = account.clone();
        let transition = account.change_plan(details, now)?;
        self.commit(event, &before, &mut account, BTreeMap::new(), None, now)
            .await?;

        Ok(ReconcileOutcome::Applied {
            user_id: account.user_id,
            transition,
            founding_member_number: None,
        })
    }

    async fn cancel(
        &self,
        event: &BillingEvent,
        details: &CancellationDetails,
        mut account: AccountSubscription,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, WebhookError> {
        let mut extra = BTreeMap::new();
        if let Some(order_ref) = details.order_ref.as_deref() {
            extra.insert(metadata_keys::ORDER_REF.to_string(), order_ref.to_string());
        }

        match account.check_cancellation(&details.subscription_ref) {
            CancellationCheck::ForeignSubscription => Ok(ReconcileOutcome::ignored(
                "cancellation for a subscription the account no longer holds",
            )),
            CancellationCheck::AlreadyCanceled => {
                extra.insert(metadata_keys::DUPLICATE.to_string(), "true".to_string());
                let marker = self.ledger_entry(event, &account, &account, extra, now);
                self.ledger.append(&marker).await?;
                Ok(ReconcileOutcome::Duplicate {
                    user_id: account.user_id,
                })
            }
            CancellationCheck::Apply => {
                let key = DeliveryKey::new(&details.subscription_ref, SubscriptionStatus::Canceled);
                self.claim_delivery(&key, now).await?;

                let before = account.clone();
                let transition = match account.cancel(now) {
                    Ok(transition) => transition,
                    Err(e) => {
                        self.release_claim(Some(&key)).await;
                        return Err(e.into());
                    }
                };
                self.commit(event, &before, &mut account, extra, Some(&key), now)
                    .await?;

                self.notify(Notification::Cancellation {
                    user_id: account.user_id.clone(),
                    email: event.customer_email().map(String::from),
                    previous_tier: before.tier,
                })
                .await;

                Ok(ReconcileOutcome::Applied {
                    user_id: account.user_id,
                    transition,
                    founding_member_number: None,
                })
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Write protocol
    // ════════════════════════════════════════════════════════════════════════════

    /// Claims the delivery record for a transition the projection has not seen.
    ///
    /// A fresh claim held by another delivery means that delivery has not
    /// committed yet, or was abandoned mid-write. Either way this event is not
    /// applied, so it is reported as retryable rather than acknowledged.
    async fn claim_delivery(&self, key: &DeliveryKey, now: Timestamp) -> Result<(), WebhookError> {
        let outcome = self
            .deliveries
            .claim(key, now, self.config.delivery_freshness)
            .await?;
        if outcome == ClaimOutcome::AlreadyClaimed {
            tracing::warn!(
                subscription_ref = %key.subscription_ref,
                status = key.status.as_str(),
                "Delivery claimed by an uncommitted delivery"
            );
            return Err(WebhookError::DeliveryInFlight(format!(
                "{} -> {}",
                key.subscription_ref,
                key.status.as_str()
            )));
        }
        Ok(())
    }

    async fn release_claim(&self, key: Option<&DeliveryKey>) {
        let Some(key) = key else { return };
        if let Err(e) = self.deliveries.release(key).await {
            tracing::warn!(
                subscription_ref = %key.subscription_ref,
                error = %e,
                "Failed to release delivery claim"
            );
        }
    }

    /// Writes the ledger entry and the projection as one unit.
    async fn commit(
        &self,
        event: &BillingEvent,
        before: &AccountSubscription,
        after: &mut AccountSubscription,
        extra: BTreeMap<String, String>,
        claim: Option<&DeliveryKey>,
        now: Timestamp,
    ) -> Result<(), WebhookError> {
        let entry = self.ledger_entry(event, before, after, extra, now);

        match self.repository.update_with_entry(after, &entry).await {
            Ok((version, appended)) => {
                if appended == AppendOutcome::AlreadyRecorded {
                    tracing::debug!(fingerprint = %entry.fingerprint, "Ledger entry already recorded");
                }
                after.version = version;
                if let Some(key) = claim {
                    // Frees the opposite transition of the same subscription.
                    self.release_claim(Some(&key.opposite())).await;
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    user_id = %after.user_id,
                    error = %e,
                    "Projection write failed"
                );
                self.release_claim(claim).await;
                Err(WebhookError::ProjectionWriteFailure(e.to_string()))
            }
        }
    }

    fn ledger_entry(
        &self,
        event: &BillingEvent,
        before: &AccountSubscription,
        after: &AccountSubscription,
        extra: BTreeMap<String, String>,
        now: Timestamp,
    ) -> SubscriptionEvent {
        let mut metadata = BTreeMap::new();
        metadata.insert(metadata_keys::USER_ID.to_string(), after.user_id.to_string());
        metadata.insert(metadata_keys::PERIOD.to_string(), after.period.as_str().to_string());
        metadata.insert(
            metadata_keys::PREVIOUS_PERIOD.to_string(),
            before.period.as_str().to_string(),
        );
        metadata.insert(metadata_keys::ACCOUNT_VERSION.to_string(), before.version.to_string());
        if let Some(subscription_ref) = event.subscription_ref() {
            metadata.insert(
                metadata_keys::SUBSCRIPTION_REF.to_string(),
                subscription_ref.to_string(),
            );
        }
        if let Some(customer_ref) = after.external_customer_ref.as_deref() {
            metadata.insert(metadata_keys::CUSTOMER_REF.to_string(), customer_ref.to_string());
        }
        if let Some(start) = after.started_at {
            metadata.insert(
                metadata_keys::PERIOD_START.to_string(),
                start.as_datetime().to_rfc3339(),
            );
        }
        if let Some(end) = after.ends_at {
            metadata.insert(metadata_keys::PERIOD_END.to_string(), end.as_datetime().to_rfc3339());
        }
        metadata.extend(extra);

        SubscriptionEvent::record(
            after.user_id.clone(),
            event.event_type(),
            before.tier,
            after.tier,
            TriggerSource::Webhook,
            metadata,
            now,
        )
    }

    async fn notify(&self, notification: Notification) {
        let sent = tokio::time::timeout(
            self.config.notification_timeout,
            self.notifier.send(&notification),
        )
        .await;

        let failure = match sent {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "timed out after {}s",
                self.config.notification_timeout.as_secs()
            ),
        };
        tracing::warn!(
            kind = notification.kind(),
            user_id = %notification.user_id(),
            error = %failure,
            "Notification send failed"
        );
    }
}

fn unchanged(account: &AccountSubscription) -> Transition {
    Transition {
        from_plan: account.plan(),
        from_status: account.status,
        to_plan: account.plan(),
        to_status: account.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryDeliveryRecordStore, InMemoryFoundingMemberSlots, InMemorySubscriptionLedger,
        InMemorySubscriptionStore,
    };
    use crate::adapters::notifications::RecordingNotificationSender;
    use crate::adapters::sleeper::RecordingSleeper;
    use crate::application::handlers::billing::BackoffPolicy;
    use crate::domain::billing::{BillingPeriod, Plan, SubscriptionEventType, SubscriptionTier};

    // ════════════════════════════════════════════════════════════════════════════
    // Test Harness
    // ════════════════════════════════════════════════════════════════════════════

    struct Harness {
        store: InMemorySubscriptionStore,
        ledger: InMemorySubscriptionLedger,
        slots: InMemoryFoundingMemberSlots,
        deliveries: InMemoryDeliveryRecordStore,
        notifier: RecordingNotificationSender,
        handler: ReconcileEventHandler,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(RecordingNotificationSender::new(), ReconcilerConfig::default())
        }

        fn with(notifier: RecordingNotificationSender, config: ReconcilerConfig) -> Self {
            let store = InMemorySubscriptionStore::new();
            let ledger = store.ledger();
            let slots = InMemoryFoundingMemberSlots::new();
            let deliveries = InMemoryDeliveryRecordStore::new();
            let resolver = AccountResolver::new(
                Arc::new(store.clone()),
                Arc::new(RecordingSleeper::new()),
                BackoffPolicy::none(),
            );
            let handler = ReconcileEventHandler::new(
                resolver,
                Arc::new(store.clone()),
                Arc::new(ledger.clone()),
                Arc::new(slots.clone()),
                Arc::new(deliveries.clone()),
                Arc::new(notifier.clone()),
                config,
            );
            Self {
                store,
                ledger,
                slots,
                deliveries,
                notifier,
                handler,
            }
        }

        async fn account(&self) -> AccountSubscription {
            self.store
                .find_by_user(&user())
                .await
                .unwrap()
                .expect("account exists")
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn at(offset_secs: u64) -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000 + offset_secs)
    }

    fn details(tier: SubscriptionTier, period: BillingPeriod, end: u64) -> SubscriptionDetails {
        SubscriptionDetails {
            subscription_ref: "sub_1".to_string(),
            customer_ref: Some("cus_1".to_string()),
            metadata_user_id: Some(user()),
            customer_email: Some("owner@example.com".to_string()),
            plan: Plan::new(tier, period),
            period_start: Some(at(0)),
            period_end: Some(at(end)),
        }
    }

    fn created() -> BillingEvent {
        BillingEvent::SubscriptionCreated(details(
            SubscriptionTier::Pro,
            BillingPeriod::Monthly,
            30 * 86_400,
        ))
    }

    fn canceled(subscription_ref: &str) -> BillingEvent {
        BillingEvent::SubscriptionCanceled(CancellationDetails {
            subscription_ref: subscription_ref.to_string(),
            customer_ref: Some("cus_1".to_string()),
            metadata_user_id: None,
            customer_email: Some("owner@example.com".to_string()),
            order_ref: None,
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Activation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn new_subscription_activates_and_grants_founding_number() {
        let h = Harness::new();

        let outcome = h.handler.handle(&created(), at(10)).await.unwrap();

        match outcome {
            ReconcileOutcome::Applied {
                transition,
                founding_member_number,
                ..
            } => {
                assert_eq!(transition.from_mrr_cents(), 0);
                assert_eq!(transition.to_mrr_cents(), 999);
                assert_eq!(founding_member_number, Some(1));
            }
            other => panic!("expected Applied, got {:?}", other),
        }

        let account = h.account().await;
        assert_eq!(account.tier, SubscriptionTier::Pro);
        assert_eq!(account.status, SubscriptionStatus::Active);
        assert_eq!(account.founding_member_number, Some(1));
        assert_eq!(account.ends_at, Some(at(30 * 86_400)));
        assert_eq!(h.ledger.len().await, 1);
        assert_eq!(h.notifier.count().await, 1);
    }

    #[tokio::test]
    async fn redelivery_is_duplicate_without_side_effects() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();

        let outcome = h.handler.handle(&created(), at(20)).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Duplicate { user_id: user() });
        assert_eq!(h.ledger.len().await, 1);
        assert_eq!(h.notifier.count().await, 1);
        assert_eq!(h.slots.claimed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn later_period_end_is_a_quiet_renewal() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();

        let renewal = BillingEvent::SubscriptionActive(details(
            SubscriptionTier::Pro,
            BillingPeriod::Monthly,
            60 * 86_400,
        ));
        let outcome = h.handler.handle(&renewal, at(30 * 86_400)).await.unwrap();

        assert_eq!(outcome.as_str(), "applied");
        assert_eq!(h.account().await.ends_at, Some(at(60 * 86_400)));
        assert_eq!(h.ledger.len().await, 2);
        assert_eq!(h.notifier.count().await, 1);
        assert_eq!(h.slots.claimed_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn exhausted_cap_still_activates() {
        let config = ReconcilerConfig {
            founding_member_cap: 0,
            ..ReconcilerConfig::default()
        };
        let h = Harness::with(RecordingNotificationSender::new(), config);

        let outcome = h.handler.handle(&created(), at(10)).await.unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied {
                founding_member_number: None,
                ..
            }
        ));
        let account = h.account().await;
        assert!(!account.is_founding_member);
        assert_eq!(account.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_event() {
        let h = Harness::with(
            RecordingNotificationSender::failing(),
            ReconcilerConfig::default(),
        );
        let outcome = h.handler.handle(&created(), at(10)).await.unwrap();
        assert_eq!(outcome.as_str(), "applied");
        assert_eq!(h.account().await.tier, SubscriptionTier::Pro);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Plan Changes
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn subscription_updated_changes_plan_and_records_previous_period() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();

        let update = BillingEvent::SubscriptionUpdated(details(
            SubscriptionTier::Family,
            BillingPeriod::Annual,
            365 * 86_400,
        ));
        h.handler.handle(&update, at(100)).await.unwrap();

        let account = h.account().await;
        assert_eq!(account.plan(), Plan::new(SubscriptionTier::Family, BillingPeriod::Annual));

        let entries = h.ledger.for_user(&user()).await;
        let last = entries.last().unwrap();
        assert_eq!(last.from_plan(), Plan::new(SubscriptionTier::Pro, BillingPeriod::Monthly));
        assert_eq!(last.to_plan().monthly_rate_cents(), 1250);

        // Same update again changes nothing.
        let again = h.handler.handle(&update, at(200)).await.unwrap();
        assert_eq!(again, ReconcileOutcome::Duplicate { user_id: user() });
    }

    #[tokio::test]
    async fn update_for_canceled_account_is_ignored() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();
        h.handler.handle(&canceled("sub_1"), at(20)).await.unwrap();

        let update = BillingEvent::SubscriptionUpdated(details(
            SubscriptionTier::Family,
            BillingPeriod::Monthly,
            30 * 86_400,
        ));
        let outcome = h.handler.handle(&update, at(30)).await.unwrap();
        assert_eq!(outcome.as_str(), "ignored");
        assert_eq!(h.account().await.tier, SubscriptionTier::Free);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Cancellation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cancellation_moves_to_free_and_duplicate_is_marked() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();

        let first = h.handler.handle(&canceled("sub_1"), at(20)).await.unwrap();
        let second = h.handler.handle(&canceled("sub_1"), at(30)).await.unwrap();

        assert_eq!(first.as_str(), "applied");
        assert_eq!(second, ReconcileOutcome::Duplicate { user_id: user() });

        let account = h.account().await;
        assert_eq!(account.status, SubscriptionStatus::Canceled);
        assert_eq!(account.tier, SubscriptionTier::Free);
        assert!(account.external_subscription_ref.is_none());

        let entries = h.ledger.for_user(&user()).await;
        assert_eq!(entries.len(), 3);
        assert!(entries[2].is_duplicate_marker());
        // Welcome + one cancellation.
        assert_eq!(h.notifier.count().await, 2);
    }

    #[tokio::test]
    async fn cancellation_of_a_replaced_subscription_is_ignored() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();

        let outcome = h.handler.handle(&canceled("sub_old"), at(20)).await.unwrap();

        assert_eq!(outcome.as_str(), "ignored");
        assert_eq!(h.account().await.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn reactivation_inside_freshness_window_applies() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();
        h.handler.handle(&canceled("sub_1"), at(20)).await.unwrap();

        let outcome = h.handler.handle(&created(), at(30)).await.unwrap();

        assert_eq!(outcome.as_str(), "applied");
        let account = h.account().await;
        assert_eq!(account.status, SubscriptionStatus::Active);
        // The founding number survives cancellation and is not re-claimed.
        assert_eq!(account.founding_member_number, Some(1));
        assert_eq!(h.slots.claimed_count().await.unwrap(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Handling
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn projection_failure_is_retryable_and_redelivery_succeeds() {
        let h = Harness::new();
        h.store
            .seed({
                let mut account = AccountSubscription::new_free(user(), at(0));
                account.external_customer_ref = Some("cus_1".to_string());
                account
            })
            .await;
        h.store.fail_next_updates(1);

        let err = h.handler.handle(&created(), at(10)).await.unwrap_err();
        assert!(matches!(err, WebhookError::ProjectionWriteFailure(_)));
        assert!(err.is_retryable());
        assert_eq!(h.account().await.status, SubscriptionStatus::Active);
        assert_eq!(h.account().await.tier, SubscriptionTier::Free);
        assert_eq!(h.notifier.count().await, 0);
        assert!(h.ledger.is_empty().await);

        let outcome = h.handler.handle(&created(), at(20)).await.unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Applied {
                founding_member_number: Some(1),
                ..
            }
        ));
        assert_eq!(h.ledger.len().await, 1);
        assert_eq!(h.slots.claimed_count().await.unwrap(), 1);
        assert_eq!(h.notifier.count().await, 1);
    }

    #[tokio::test]
    async fn failed_plan_change_leaves_no_ledger_entry() {
        let h = Harness::new();
        h.handler.handle(&created(), at(10)).await.unwrap();

        let update = BillingEvent::SubscriptionUpdated(details(
            SubscriptionTier::Family,
            BillingPeriod::Monthly,
            30 * 86_400,
        ));
        h.store.fail_next_updates(1);
        let err = h.handler.handle(&update, at(20)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(h.ledger.len().await, 1);

        // A cancellation lands before the processor redelivers the update.
        h.handler.handle(&canceled("sub_1"), at(30)).await.unwrap();
        let redelivered = h.handler.handle(&update, at(40)).await.unwrap();
        assert_eq!(redelivered.as_str(), "ignored");

        let entries = h.ledger.for_user(&user()).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event_type, SubscriptionEventType::SubscriptionCanceled);
        assert_eq!(entries[1].from_tier, SubscriptionTier::Pro);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Delivery Claims
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn claim_held_by_another_delivery_is_retryable() {
        let h = Harness::new();
        let key = DeliveryKey::new("sub_1", SubscriptionStatus::Active);
        h.deliveries
            .claim(&key, at(0), DEFAULT_DELIVERY_FRESHNESS)
            .await
            .unwrap();

        let err = h.handler.handle(&created(), at(60)).await.unwrap_err();

        assert!(matches!(err, WebhookError::DeliveryInFlight(_)));
        assert!(err.is_retryable());
        assert_eq!(h.account().await.tier, SubscriptionTier::Free);
        assert!(h.ledger.is_empty().await);
        assert_eq!(h.notifier.count().await, 0);
    }

    #[tokio::test]
    async fn stale_claim_is_taken_over_by_redelivery() {
        let h = Harness::new();
        let key = DeliveryKey::new("sub_1", SubscriptionStatus::Canceled);
        h.handler.handle(&created(), at(10)).await.unwrap();
        h.deliveries
            .claim(&key, at(20), DEFAULT_DELIVERY_FRESHNESS)
            .await
            .unwrap();

        let held = h.handler.handle(&canceled("sub_1"), at(30)).await.unwrap_err();
        assert!(matches!(held, WebhookError::DeliveryInFlight(_)));
        assert_eq!(h.account().await.status, SubscriptionStatus::Active);

        let after_window = at(20 + DEFAULT_DELIVERY_FRESHNESS.as_secs() + 1);
        let outcome = h.handler.handle(&canceled("sub_1"), after_window).await.unwrap();

        assert_eq!(outcome.as_str(), "applied");
        assert_eq!(h.account().await.status, SubscriptionStatus::Canceled);
    }
}
