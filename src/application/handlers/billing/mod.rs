//! Billing handlers.
//!
//! ## Commands
//! - Processing billing webhooks (verify, normalize, reconcile)
//!
//! ## Queries
//! - Subscription access for feature gating

mod get_subscription_access;
mod handle_billing_webhook;
mod reconcile_event;
mod resolve_account;

pub use get_subscription_access::{GetSubscriptionAccessHandler, GetSubscriptionAccessQuery};
pub use handle_billing_webhook::{HandleBillingWebhookCommand, HandleBillingWebhookHandler};
pub use reconcile_event::{
    ReconcileEventHandler, ReconcileOutcome, ReconcilerConfig, DEFAULT_FOUNDING_MEMBER_CAP,
};
pub use resolve_account::{AccountResolver, BackoffPolicy, ResolutionPath, ResolvedAccount};
