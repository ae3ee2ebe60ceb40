//! Canonical billing events.
//!
//! The normalizer turns provider payloads into one of these variants; the
//! reconciler matches on them exhaustively.

use crate::domain::foundation::{Timestamp, UserId};

use super::events::SubscriptionEventType;
use super::pricing::Plan;

/// Checkout completion: binds a customer reference to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutDetails {
    pub checkout_id: String,
    pub customer_ref: Option<String>,
    pub metadata_user_id: Option<UserId>,
    pub customer_email: Option<String>,
}

/// Subscription lifecycle payload for activations and plan changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionDetails {
    pub subscription_ref: String,
    pub customer_ref: Option<String>,
    pub metadata_user_id: Option<UserId>,
    pub customer_email: Option<String>,
    pub plan: Plan,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
}

/// Payload for cancellations, revocations, and refunds.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationDetails {
    pub subscription_ref: String,
    pub customer_ref: Option<String>,
    pub metadata_user_id: Option<UserId>,
    pub customer_email: Option<String>,
    /// Refund order id when the cancellation came from `order.refunded`.
    pub order_ref: Option<String>,
}

/// Closed set of events the reconciler understands.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    CheckoutSucceeded(CheckoutDetails),
    SubscriptionCreated(SubscriptionDetails),
    SubscriptionActive(SubscriptionDetails),
    SubscriptionUpdated(SubscriptionDetails),
    SubscriptionCanceled(CancellationDetails),
    SubscriptionRevoked(CancellationDetails),
    OrderRefunded(CancellationDetails),
}

impl BillingEvent {
    /// Ledger event type for this variant.
    pub fn event_type(&self) -> SubscriptionEventType {
        match self {
            BillingEvent::CheckoutSucceeded(_) => SubscriptionEventType::CheckoutSucceeded,
            BillingEvent::SubscriptionCreated(_) => SubscriptionEventType::SubscriptionCreated,
            BillingEvent::SubscriptionActive(_) => SubscriptionEventType::SubscriptionActive,
            BillingEvent::SubscriptionUpdated(_) => SubscriptionEventType::SubscriptionUpdated,
            BillingEvent::SubscriptionCanceled(_) => SubscriptionEventType::SubscriptionCanceled,
            BillingEvent::SubscriptionRevoked(_) => SubscriptionEventType::SubscriptionRevoked,
            BillingEvent::OrderRefunded(_) => SubscriptionEventType::OrderRefunded,
        }
    }

    pub fn customer_ref(&self) -> Option<&str> {
        match self {
            BillingEvent::CheckoutSucceeded(d) => d.customer_ref.as_deref(),
            BillingEvent::SubscriptionCreated(d)
            | BillingEvent::SubscriptionActive(d)
            | BillingEvent::SubscriptionUpdated(d) => d.customer_ref.as_deref(),
            BillingEvent::SubscriptionCanceled(d)
            | BillingEvent::SubscriptionRevoked(d)
            | BillingEvent::OrderRefunded(d) => d.customer_ref.as_deref(),
        }
    }

    pub fn metadata_user_id(&self) -> Option<&UserId> {
        match self {
            BillingEvent::CheckoutSucceeded(d) => d.metadata_user_id.as_ref(),
            BillingEvent::SubscriptionCreated(d)
            | BillingEvent::SubscriptionActive(d)
            | BillingEvent::SubscriptionUpdated(d) => d.metadata_user_id.as_ref(),
            BillingEvent::SubscriptionCanceled(d)
            | BillingEvent::SubscriptionRevoked(d)
            | BillingEvent::OrderRefunded(d) => d.metadata_user_id.as_ref(),
        }
    }

    pub fn customer_email(&self) -> Option<&str> {
        match self {
            BillingEvent::CheckoutSucceeded(d) => d.customer_email.as_deref(),
            BillingEvent::SubscriptionCreated(d)
            | BillingEvent::SubscriptionActive(d)
            | BillingEvent::SubscriptionUpdated(d) => d.customer_email.as_deref(),
            BillingEvent::SubscriptionCanceled(d)
            | BillingEvent::SubscriptionRevoked(d)
            | BillingEvent::OrderRefunded(d) => d.customer_email.as_deref(),
        }
    }

    /// External subscription reference, when the event carries one.
    pub fn subscription_ref(&self) -> Option<&str> {
        match self {
            BillingEvent::CheckoutSucceeded(_) => None,
            BillingEvent::SubscriptionCreated(d)
            | BillingEvent::SubscriptionActive(d)
            | BillingEvent::SubscriptionUpdated(d) => Some(&d.subscription_ref),
            BillingEvent::SubscriptionCanceled(d)
            | BillingEvent::SubscriptionRevoked(d)
            | BillingEvent::OrderRefunded(d) => Some(&d.subscription_ref),
        }
    }
}
