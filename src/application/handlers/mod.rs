//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod billing;
pub mod revenue;

pub use billing::{
    AccountResolver, BackoffPolicy, GetSubscriptionAccessHandler, GetSubscriptionAccessQuery,
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, ReconcileEventHandler,
    ReconcileOutcome, ReconcilerConfig, ResolutionPath, ResolvedAccount,
    DEFAULT_FOUNDING_MEMBER_CAP,
};
pub use revenue::{
    BillingMetrics, FoundingMemberSummary, LedgerPage, ListLedgerEventsHandler,
    ListLedgerEventsQuery, MetricsAggregator, MetricsConfig, MetricsParams, PeriodComparison,
    RevenueMetrics,
};
