//! DeliveryRecordStore port - short-lived webhook delivery claims.
//!
//! The processor may deliver the same event several times concurrently. Before
//! applying a state change the reconciler claims `(subscription ref, target
//! status)`; a second delivery inside the freshness window loses the claim.
//! The loser has not applied anything, so it is answered as retryable; once
//! the window passes an abandoned claim can be taken over. Adapters discard
//! claims older than the window.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::billing::SubscriptionStatus;
use crate::domain::foundation::{DomainError, Timestamp};

/// Default freshness window for delivery claims.
pub const DEFAULT_DELIVERY_FRESHNESS: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryKey {
    pub subscription_ref: String,
    pub status: SubscriptionStatus,
}

impl DeliveryKey {
    pub fn new(subscription_ref: impl Into<String>, status: SubscriptionStatus) -> Self {
        Self {
            subscription_ref: subscription_ref.into(),
            status,
        }
    }

    /// The key for the opposite status of the same subscription.
    pub fn opposite(&self) -> Self {
        let status = match self.status {
            SubscriptionStatus::Active => SubscriptionStatus::Canceled,
            SubscriptionStatus::Canceled => SubscriptionStatus::Active,
        };
        Self::new(self.subscription_ref.clone(), status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// A fresh claim for the same key exists.
    AlreadyClaimed,
}

#[async_trait]
pub trait DeliveryRecordStore: Send + Sync {
    /// Atomically claim `key`.
    ///
    /// Succeeds if no record exists or the existing record is older than
    /// `freshness` relative to `now`.
    async fn claim(
        &self,
        key: &DeliveryKey,
        now: Timestamp,
        freshness: Duration,
    ) -> Result<ClaimOutcome, DomainError>;

    /// Drop a claim so the next delivery is processed normally.
    async fn release(&self, key: &DeliveryKey) -> Result<(), DomainError>;
}
