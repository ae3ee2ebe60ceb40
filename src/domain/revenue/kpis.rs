//! Churn, lifetime value, growth, and projection.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::billing::SubscriptionEvent;
use crate::domain::foundation::Timestamp;

use super::replay::LedgerReplay;
use super::waterfall::MonthlyMrr;

/// Lifetime assumed when nobody churned in the window.
pub const ZERO_CHURN_LIFETIME_MONTHS: i64 = 36;

/// Months of the waterfall averaged for the growth rate.
const GROWTH_MONTHS: usize = 3;

const DAYS_PER_MONTH: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnReport {
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub cancellations: usize,
    pub accounts_at_start: usize,
    /// Fraction of accounts lost over the window (0.0 - 1.0).
    pub rate: f64,
    /// `rate` normalized to a 30-day month.
    pub monthly_rate: f64,
}

/// Cancellations in `[window_start, window_end)` over accounts that were
/// active or canceled at `window_start`.
///
/// Only state-changing cancellations of a paid tier are counted; redelivered
/// cancellations are in the ledger as markers and skipped.
pub fn churn_rate(
    entries: &[SubscriptionEvent],
    window_start: Timestamp,
    window_end: Timestamp,
) -> ChurnReport {
    let accounts_at_start = LedgerReplay::until(entries, window_start).subscribed_or_canceled();

    let cancellations = entries
        .iter()
        .filter(|e| !e.created_at.is_before(&window_start) && e.created_at.is_before(&window_end))
        .filter(|e| e.event_type.is_cancellation() && e.from_tier.is_paid())
        .filter(|e| !e.is_duplicate_marker())
        .count();

    let rate = if accounts_at_start == 0 {
        0.0
    } else {
        cancellations as f64 / accounts_at_start as f64
    };

    let window_days = window_end.duration_since(&window_start).num_days().max(1) as f64;
    let monthly_rate = rate * DAYS_PER_MONTH / window_days;

    ChurnReport {
        window_start,
        window_end,
        cancellations,
        accounts_at_start,
        rate,
        monthly_rate,
    }
}

/// LTV to acquisition cost ratio; "undefined" without a tracked cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LtvCacRatio {
    Ratio(f64),
    Undefined,
}

impl Serialize for LtvCacRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LtvCacRatio::Ratio(value) => serializer.serialize_f64(*value),
            LtvCacRatio::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

impl<'de> Deserialize<'de> for LtvCacRatio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(LtvCacRatio::Ratio(value)),
            Raw::Text(text) if text == "undefined" => Ok(LtvCacRatio::Undefined),
            Raw::Text(text) => Err(serde::de::Error::custom(format!(
                "invalid LTV:CAC ratio: {}",
                text
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtvReport {
    /// Average revenue per paying account, cents per month.
    pub arpu_cents: f64,
    pub ltv_cents: f64,
    pub customer_acquisition_cost_cents: i64,
    pub ltv_cac_ratio: LtvCacRatio,
}

/// LTV = ARPU / monthly churn, or ARPU x 36 months when churn is zero.
pub fn lifetime_value(
    current_mrr_cents: i64,
    paying_accounts: usize,
    monthly_churn_rate: f64,
    customer_acquisition_cost_cents: i64,
) -> LtvReport {
    let arpu_cents = if paying_accounts == 0 {
        0.0
    } else {
        current_mrr_cents as f64 / paying_accounts as f64
    };

    let ltv_cents = if monthly_churn_rate > 0.0 {
        arpu_cents / monthly_churn_rate
    } else {
        arpu_cents * ZERO_CHURN_LIFETIME_MONTHS as f64
    };

    let ltv_cac_ratio = if customer_acquisition_cost_cents > 0 {
        LtvCacRatio::Ratio(ltv_cents / customer_acquisition_cost_cents as f64)
    } else {
        LtvCacRatio::Undefined
    };

    LtvReport {
        arpu_cents,
        ltv_cents,
        customer_acquisition_cost_cents,
        ltv_cac_ratio,
    }
}

/// Average month-over-month % change of `ending` over the latest months.
///
/// Pairs whose earlier month ended at zero have no defined growth and are
/// skipped. Returns 0.0 when no pair qualifies.
pub fn average_growth_rate(waterfall: &[MonthlyMrr]) -> f64 {
    let tail_start = waterfall.len().saturating_sub(GROWTH_MONTHS + 1);
    let changes: Vec<f64> = waterfall[tail_start..]
        .windows(2)
        .filter(|pair| pair[0].ending_cents != 0)
        .map(|pair| {
            (pair[1].ending_cents - pair[0].ending_cents) as f64 / pair[0].ending_cents as f64
                * 100.0
        })
        .collect();

    if changes.is_empty() {
        0.0
    } else {
        changes.iter().sum::<f64>() / changes.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueProjection {
    pub growth_rate_percent: f64,
    /// Projected MRR for each of the following months, cents.
    pub monthly_mrr_cents: Vec<i64>,
    /// Sum of the projected months, cents.
    pub total_cents: i64,
}

/// Compounds current MRR forward by the growth rate.
pub fn project_revenue(current_mrr_cents: i64, growth_rate_percent: f64, months: u32) -> RevenueProjection {
    let factor = 1.0 + growth_rate_percent / 100.0;
    let monthly_mrr_cents: Vec<i64> = (1..=months as i32)
        .map(|k| (current_mrr_cents as f64 * factor.powi(k)).round().max(0.0) as i64)
        .collect();
    let total_cents = monthly_mrr_cents.iter().sum();

    RevenueProjection {
        growth_rate_percent,
        monthly_mrr_cents,
        total_cents,
    }
}
