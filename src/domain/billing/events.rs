//! Ledger entries.
//!
//! Every accepted billing event becomes one immutable `SubscriptionEvent`.
//! Entries are content-addressed: the fingerprint covers everything that
//! describes the transition but not the wall-clock write time, so a retried
//! write of the same transition collides instead of duplicating.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::foundation::{LedgerEntryId, Timestamp, UserId};

use super::pricing::Plan;
use super::tier::{BillingPeriod, SubscriptionTier};

/// Metadata keys written by the reconciler.
pub mod metadata_keys {
    pub const PERIOD: &str = "period";
    pub const PREVIOUS_PERIOD: &str = "previousPeriod";
    pub const USER_ID: &str = "userId";
    pub const SUBSCRIPTION_REF: &str = "externalSubscriptionRef";
    pub const CUSTOMER_REF: &str = "externalCustomerRef";
    pub const PERIOD_START: &str = "currentPeriodStart";
    pub const PERIOD_END: &str = "currentPeriodEnd";
    pub const ACCOUNT_VERSION: &str = "accountVersion";
    pub const DUPLICATE: &str = "duplicate";
    pub const ORDER_REF: &str = "orderRef";
}

/// Canonical event types recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEventType {
    CheckoutSucceeded,
    SubscriptionCreated,
    SubscriptionActive,
    SubscriptionUpdated,
    SubscriptionCanceled,
    SubscriptionRevoked,
    OrderRefunded,
}

impl SubscriptionEventType {
    pub const ALL: [SubscriptionEventType; 7] = [
        SubscriptionEventType::CheckoutSucceeded,
        SubscriptionEventType::SubscriptionCreated,
        SubscriptionEventType::SubscriptionActive,
        SubscriptionEventType::SubscriptionUpdated,
        SubscriptionEventType::SubscriptionCanceled,
        SubscriptionEventType::SubscriptionRevoked,
        SubscriptionEventType::OrderRefunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionEventType::CheckoutSucceeded => "checkout_succeeded",
            SubscriptionEventType::SubscriptionCreated => "subscription_created",
            SubscriptionEventType::SubscriptionActive => "subscription_active",
            SubscriptionEventType::SubscriptionUpdated => "subscription_updated",
            SubscriptionEventType::SubscriptionCanceled => "subscription_canceled",
            SubscriptionEventType::SubscriptionRevoked => "subscription_revoked",
            SubscriptionEventType::OrderRefunded => "order_refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// True for the event types that move an account to `active`.
    pub fn is_activation(&self) -> bool {
        matches!(
            self,
            SubscriptionEventType::SubscriptionCreated | SubscriptionEventType::SubscriptionActive
        )
    }

    /// True for the event types that end a subscription.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            SubscriptionEventType::SubscriptionCanceled
                | SubscriptionEventType::SubscriptionRevoked
                | SubscriptionEventType::OrderRefunded
        )
    }
}

impl std::fmt::Display for SubscriptionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Webhook,
    Admin,
    System,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Webhook => "webhook",
            TriggerSource::Admin => "admin",
            TriggerSource::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "webhook" => Some(TriggerSource::Webhook),
            "admin" => Some(TriggerSource::Admin),
            "system" => Some(TriggerSource::System),
            _ => None,
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub id: LedgerEntryId,
    pub user_id: UserId,
    pub event_type: SubscriptionEventType,
    pub from_tier: SubscriptionTier,
    pub to_tier: SubscriptionTier,
    pub trigger_source: TriggerSource,
    pub metadata: BTreeMap<String, String>,
    pub created_at: Timestamp,
    pub fingerprint: String,
}

impl SubscriptionEvent {
    /// Creates a new entry and computes its fingerprint.
    pub fn record(
        user_id: UserId,
        event_type: SubscriptionEventType,
        from_tier: SubscriptionTier,
        to_tier: SubscriptionTier,
        trigger_source: TriggerSource,
        metadata: BTreeMap<String, String>,
        created_at: Timestamp,
    ) -> Self {
        let fingerprint = fingerprint(&user_id, event_type, from_tier, to_tier, &metadata);
        Self {
            id: LedgerEntryId::new(),
            user_id,
            event_type,
            from_tier,
            to_tier,
            trigger_source,
            metadata,
            created_at,
            fingerprint,
        }
    }

    /// Rebuilds an entry loaded from storage without recomputing anything.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: LedgerEntryId,
        user_id: UserId,
        event_type: SubscriptionEventType,
        from_tier: SubscriptionTier,
        to_tier: SubscriptionTier,
        trigger_source: TriggerSource,
        metadata: BTreeMap<String, String>,
        created_at: Timestamp,
        fingerprint: String,
    ) -> Self {
        Self {
            id,
            user_id,
            event_type,
            from_tier,
            to_tier,
            trigger_source,
            metadata,
            created_at,
            fingerprint,
        }
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Billing period after the transition (monthly if unrecorded).
    pub fn period(&self) -> BillingPeriod {
        self.metadata_value(metadata_keys::PERIOD)
            .and_then(BillingPeriod::parse)
            .unwrap_or_default()
    }

    /// Billing period before the transition; falls back to `period`.
    pub fn previous_period(&self) -> BillingPeriod {
        self.metadata_value(metadata_keys::PREVIOUS_PERIOD)
            .and_then(BillingPeriod::parse)
            .unwrap_or_else(|| self.period())
    }

    pub fn from_plan(&self) -> Plan {
        Plan::new(self.from_tier, self.previous_period())
    }

    pub fn to_plan(&self) -> Plan {
        Plan::new(self.to_tier, self.period())
    }

    /// True for no-op entries recording a redelivered cancellation.
    pub fn is_duplicate_marker(&self) -> bool {
        self.metadata_value(metadata_keys::DUPLICATE) == Some("true")
    }
}

/// SHA-256 content address of a transition.
fn fingerprint(
    user_id: &UserId,
    event_type: SubscriptionEventType,
    from_tier: SubscriptionTier,
    to_tier: SubscriptionTier,
    metadata: &BTreeMap<String, String>,
) -> String {
    let field = |key: &str| metadata.get(key).map(String::as_str).unwrap_or("");

    let mut hasher = Sha256::new();
    for part in [
        event_type.as_str(),
        user_id.as_str(),
        field(metadata_keys::SUBSCRIPTION_REF),
        from_tier.as_str(),
        to_tier.as_str(),
        field(metadata_keys::PERIOD),
        field(metadata_keys::PREVIOUS_PERIOD),
        field(metadata_keys::PERIOD_START),
        field(metadata_keys::PERIOD_END),
        field(metadata_keys::ACCOUNT_VERSION),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}
