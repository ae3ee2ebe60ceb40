//! Billing domain module.
//!
//! Subscription lifecycle: webhook verification, event normalization, and the
//! account projection the reconciler maintains.
//!
//! # Module Structure
//!
//! - `account` - AccountSubscription aggregate and idempotency guards
//! - `billing_event` - Canonical BillingEvent variants
//! - `envelope` - `{type, data}` envelope validation
//! - `events` - Ledger entries and their content address
//! - `normalizer` - Provider payload to BillingEvent mapping
//! - `pricing` - Price table
//! - `status` - SubscriptionStatus state machine
//! - `tier` - SubscriptionTier and BillingPeriod
//! - `webhook_verifier` - HMAC-SHA256 signature verification

mod account;
mod billing_event;
mod envelope;
mod events;
mod normalizer;
mod pricing;
mod product_catalog;
mod status;
mod tier;
mod webhook_errors;
mod webhook_verifier;

pub use account::{
    AccountSubscription, ActivationCheck, CancellationCheck, SubscriptionAccess, Transition,
};
pub use billing_event::{BillingEvent, CancellationDetails, CheckoutDetails, SubscriptionDetails};
pub use envelope::WebhookEnvelope;
pub use events::{metadata_keys, SubscriptionEvent, SubscriptionEventType, TriggerSource};
pub use normalizer::EventNormalizer;
pub use pricing::{monthly_rate_cents, Plan};
pub use product_catalog::ProductCatalog;
pub use status::SubscriptionStatus;
pub use tier::{BillingPeriod, SubscriptionTier};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{sign_payload, SignatureHeader, WebhookSignatureVerifier, SIGNATURE_HEADERS};
