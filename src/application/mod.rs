//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Webhook processing is the only write path; metrics and ledger listings
//! are read-only queries.

pub mod handlers;

pub use handlers::{
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, MetricsAggregator,
    ReconcileEventHandler, ReconcileOutcome,
};
