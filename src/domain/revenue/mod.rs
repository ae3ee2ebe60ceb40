//! Revenue domain module.
//!
//! Pure computations over ledger entries and account snapshots. Nothing here
//! touches storage or caching; the metrics handler feeds these functions.
//!
//! # Module Structure
//!
//! - `replay` - Per-user MRR replay of the ledger
//! - `waterfall` - Monthly MRR waterfall
//! - `retention` - Net revenue retention
//! - `kpis` - Churn, LTV, growth, projection
//! - `cohort` - Revenue by signup month
//! - `snapshot` - Current MRR and account breakdowns

mod cohort;
mod kpis;
mod replay;
mod retention;
mod snapshot;
mod waterfall;

use chrono::{Months, NaiveDate, TimeZone, Utc};

use crate::domain::foundation::Timestamp;

pub use cohort::{revenue_by_cohort, CohortRevenue};
pub use kpis::{
    average_growth_rate, churn_rate, lifetime_value, project_revenue, ChurnReport, LtvCacRatio,
    LtvReport, RevenueProjection, ZERO_CHURN_LIFETIME_MONTHS,
};
pub use replay::{mrr_after, LedgerReplay, ReplayedStatus};
pub use retention::{net_revenue_retention, RetentionReport};
pub use snapshot::{current_mrr_cents, SubscriptionSnapshot};
pub use waterfall::{build_waterfall, MonthlyMrr};

/// Adds calendar months to a date; saturates at the input on overflow.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

/// Subtracts calendar months from a date; saturates at the input on overflow.
pub fn sub_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(date)
}

/// Midnight UTC at the start of the given date.
pub fn month_start_timestamp(date: NaiveDate) -> Timestamp {
    Timestamp::from_datetime(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}
