//! AccountResolver - maps a billing event to the internal account it belongs to.
//!
//! Lookup order:
//! 1. `externalCustomerRef`, then `externalSubscriptionRef`
//! 2. `metadata.userId`, backfilling the customer binding
//! 3. the primary lookup again after each backoff delay
//!
//! If every attempt misses, the event is reported as `AccountUnresolved` so the
//! processor redelivers it later. An event carrying none of the three
//! identifiers can never resolve and is rejected as `PayloadMalformed`.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::billing::{AccountSubscription, BillingEvent, WebhookError};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{InsertResult, Sleeper, SubscriptionRepository};

/// Delays between primary-lookup retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub delays: Vec<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_millis(&[500, 1500])
    }
}

impl BackoffPolicy {
    pub fn from_millis(delays: &[u64]) -> Self {
        Self {
            delays: delays.iter().copied().map(Duration::from_millis).collect(),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }
}

/// How an account was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    CustomerRef,
    SubscriptionRef,
    Metadata,
    Retry { attempt: u32 },
}

impl ResolutionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPath::CustomerRef => "customer_ref",
            ResolutionPath::SubscriptionRef => "subscription_ref",
            ResolutionPath::Metadata => "metadata",
            ResolutionPath::Retry { .. } => "retry",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedAccount {
    pub account: AccountSubscription,
    pub path: ResolutionPath,
}

pub struct AccountResolver {
    repository: Arc<dyn SubscriptionRepository>,
    sleeper: Arc<dyn Sleeper>,
    policy: BackoffPolicy,
}

impl AccountResolver {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        sleeper: Arc<dyn Sleeper>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            repository,
            sleeper,
            policy,
        }
    }

    pub async fn resolve(
        &self,
        event: &BillingEvent,
        now: Timestamp,
    ) -> Result<ResolvedAccount, WebhookError> {
        let customer_ref = event.customer_ref();
        let subscription_ref = event.subscription_ref();

        if customer_ref.is_none() && subscription_ref.is_none() && event.metadata_user_id().is_none()
        {
            tracing::warn!(
                event_type = event.event_type().as_str(),
                "Event carries no account identifier"
            );
            return Err(WebhookError::malformed(
                "event carries no customer, subscription, or user reference",
            ));
        }

        if let Some(resolved) = self.primary_lookup(customer_ref, subscription_ref).await? {
            return Ok(resolved);
        }

        if let Some(user_id) = event.metadata_user_id() {
            let mut account = self.load_or_create(user_id, now).await?;
            if let Some(customer_ref) = customer_ref {
                if account.bind_customer(customer_ref, now) {
                    match self.repository.update(&account).await {
                        Ok(version) => {
                            account.version = version;
                            tracing::info!(
                                user_id = %account.user_id,
                                customer_ref,
                                "Backfilled customer binding from event metadata"
                            );
                        }
                        // A concurrent delivery wrote the row first.
                        Err(e) if e.code == ErrorCode::ConcurrentModification => {
                            account = self.reload(user_id).await?;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            return Ok(ResolvedAccount {
                account,
                path: ResolutionPath::Metadata,
            });
        }

        for (attempt, delay) in self.policy.delays.iter().enumerate() {
            let attempt = attempt as u32 + 1;
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying account lookup");
            self.sleeper.sleep(*delay).await;

            if let Some(resolved) = self.primary_lookup(customer_ref, subscription_ref).await? {
                return Ok(ResolvedAccount {
                    path: ResolutionPath::Retry { attempt },
                    ..resolved
                });
            }
        }

        let customer_ref = customer_ref.unwrap_or("<none>").to_string();
        tracing::warn!(
            event_type = event.event_type().as_str(),
            customer_ref = %customer_ref,
            "Account unresolved"
        );
        Err(WebhookError::AccountUnresolved { customer_ref })
    }

    async fn primary_lookup(
        &self,
        customer_ref: Option<&str>,
        subscription_ref: Option<&str>,
    ) -> Result<Option<ResolvedAccount>, DomainError> {
        if let Some(customer_ref) = customer_ref {
            if let Some(account) = self.repository.find_by_customer_ref(customer_ref).await? {
                return Ok(Some(ResolvedAccount {
                    account,
                    path: ResolutionPath::CustomerRef,
                }));
            }
        }
        if let Some(subscription_ref) = subscription_ref {
            if let Some(account) = self
                .repository
                .find_by_subscription_ref(subscription_ref)
                .await?
            {
                return Ok(Some(ResolvedAccount {
                    account,
                    path: ResolutionPath::SubscriptionRef,
                }));
            }
        }
        Ok(None)
    }

    async fn load_or_create(
        &self,
        user_id: &UserId,
        now: Timestamp,
    ) -> Result<AccountSubscription, DomainError> {
        if let Some(account) = self.repository.find_by_user(user_id).await? {
            return Ok(account);
        }

        let account = AccountSubscription::new_free(user_id.clone(), now);
        match self.repository.insert(&account).await? {
            InsertResult::Inserted => Ok(account),
            InsertResult::AlreadyExists => self.reload(user_id).await,
        }
    }

    async fn reload(&self, user_id: &UserId) -> Result<AccountSubscription, DomainError> {
        self.repository
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| DomainError::database("subscription row vanished after conflict"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::adapters::sleeper::RecordingSleeper;
    use crate::domain::billing::{
        BillingPeriod, CancellationDetails, CheckoutDetails, Plan, SubscriptionDetails,
        SubscriptionTier,
    };
    use crate::domain::foundation::UserId;

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000)
    }

    fn created(customer_ref: Option<&str>, user: Option<&str>) -> BillingEvent {
        BillingEvent::SubscriptionCreated(SubscriptionDetails {
            subscription_ref: "sub_1".to_string(),
            customer_ref: customer_ref.map(String::from),
            metadata_user_id: user.map(|u| UserId::new(u).unwrap()),
            customer_email: None,
            plan: Plan::new(SubscriptionTier::Pro, BillingPeriod::Monthly),
            period_start: None,
            period_end: None,
        })
    }

    fn bound_account(user: &str, customer_ref: &str) -> AccountSubscription {
        let mut account = AccountSubscription::new_free(UserId::new(user).unwrap(), now());
        account.external_customer_ref = Some(customer_ref.to_string());
        account
    }

    fn resolver(store: &InMemorySubscriptionStore, sleeper: &RecordingSleeper) -> AccountResolver {
        AccountResolver::new(
            Arc::new(store.clone()),
            Arc::new(sleeper.clone()),
            BackoffPolicy::default(),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Lookup Order
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn resolves_by_customer_ref_first() {
        let store = InMemorySubscriptionStore::new();
        store.seed(bound_account("user-1", "cus_1")).await;
        let sleeper = RecordingSleeper::new();

        let resolved = resolver(&store, &sleeper)
            .resolve(&created(Some("cus_1"), Some("someone-else")), now())
            .await
            .unwrap();

        assert_eq!(resolved.path, ResolutionPath::CustomerRef);
        assert_eq!(resolved.account.user_id.as_str(), "user-1");
        assert!(sleeper.delays().await.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_subscription_ref() {
        let store = InMemorySubscriptionStore::new();
        let mut account = AccountSubscription::new_free(UserId::new("user-1").unwrap(), now());
        account.external_subscription_ref = Some("sub_9".to_string());
        store.seed(account).await;

        let event = BillingEvent::SubscriptionCanceled(CancellationDetails {
            subscription_ref: "sub_9".to_string(),
            customer_ref: None,
            metadata_user_id: None,
            customer_email: None,
            order_ref: None,
        });
        let resolved = resolver(&store, &RecordingSleeper::new())
            .resolve(&event, now())
            .await
            .unwrap();
        assert_eq!(resolved.path, ResolutionPath::SubscriptionRef);
    }

    #[tokio::test]
    async fn metadata_fallback_creates_row_and_backfills_binding() {
        let store = InMemorySubscriptionStore::new();
        let resolved = resolver(&store, &RecordingSleeper::new())
            .resolve(&created(Some("cus_new"), Some("user-7")), now())
            .await
            .unwrap();

        assert_eq!(resolved.path, ResolutionPath::Metadata);
        assert_eq!(resolved.account.external_customer_ref.as_deref(), Some("cus_new"));

        let stored = store
            .find_by_customer_ref("cus_new")
            .await
            .unwrap()
            .expect("binding persisted");
        assert_eq!(stored.user_id.as_str(), "user-7");
        assert_eq!(stored.version, resolved.account.version);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Retry
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn exhausting_retries_is_retryable_error() {
        let store = InMemorySubscriptionStore::new();
        let sleeper = RecordingSleeper::new();

        let err = resolver(&store, &sleeper)
            .resolve(&created(Some("cus_missing"), None), now())
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(matches!(
            err,
            WebhookError::AccountUnresolved { ref customer_ref } if customer_ref == "cus_missing"
        ));
        assert_eq!(
            sleeper.delays().await,
            vec![Duration::from_millis(500), Duration::from_millis(1500)]
        );
    }

    #[tokio::test]
    async fn no_policy_means_no_sleep() {
        let store = InMemorySubscriptionStore::new();
        let sleeper = RecordingSleeper::new();
        let resolver = AccountResolver::new(
            Arc::new(store.clone()),
            Arc::new(sleeper.clone()),
            BackoffPolicy::none(),
        );

        assert!(resolver
            .resolve(&created(Some("cus_missing"), None), now())
            .await
            .is_err());
        assert!(sleeper.delays().await.is_empty());
    }

    #[tokio::test]
    async fn event_without_identifiers_is_malformed_not_retried() {
        let store = InMemorySubscriptionStore::new();
        let sleeper = RecordingSleeper::new();
        let checkout = BillingEvent::CheckoutSucceeded(CheckoutDetails {
            checkout_id: "chk_1".to_string(),
            customer_ref: None,
            metadata_user_id: None,
            customer_email: Some("owner@example.com".to_string()),
        });

        let err = resolver(&store, &sleeper)
            .resolve(&checkout, now())
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::PayloadMalformed(_)));
        assert!(!err.is_retryable());
        assert!(sleeper.delays().await.is_empty());
        assert!(store.is_empty().await);
    }

    #[test]
    fn default_policy_is_two_retries() {
        assert_eq!(BackoffPolicy::default().delays.len(), 2);
    }
}
