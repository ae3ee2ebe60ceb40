//! Revenue reporting handlers.

mod list_ledger_events;
mod metrics_aggregator;

pub use list_ledger_events::{LedgerPage, ListLedgerEventsHandler, ListLedgerEventsQuery};
pub use metrics_aggregator::{
    BillingMetrics, FoundingMemberSummary, MetricsAggregator, MetricsConfig, MetricsParams,
    PeriodComparison, RevenueMetrics,
};
