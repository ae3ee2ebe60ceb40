//! MetricsAggregator - cached revenue views over the ledger and account projection.
//!
//! Two views are computed independently and cached under keys derived from
//! their parameters:
//!
//! - **metrics**: snapshot, founding-member summary, churn, NRR, LTV
//! - **revenue**: MRR waterfall, growth rate, projection, signup cohorts
//!
//! `refresh` drops one key, recomputes it and stores the result; other keys
//! are left alone. A refreshed key whose result cannot be stored stays empty
//! rather than serving the view the caller asked to replace.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::revenue::{
    average_growth_rate, build_waterfall, churn_rate, lifetime_value, net_revenue_retention,
    project_revenue, revenue_by_cohort, sub_months, ChurnReport, CohortRevenue, LedgerReplay,
    LtvReport, MonthlyMrr, RetentionReport, RevenueProjection, SubscriptionSnapshot,
};
use crate::ports::{FoundingMemberSlots, MetricsCache, SubscriptionLedger, SubscriptionRepository};

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub cache_ttl: Duration,
    pub waterfall_lookback_months: u32,
    pub nrr_window_days: i64,
    pub churn_window_days: i64,
    /// Zero means acquisition cost is not tracked.
    pub customer_acquisition_cost_cents: i64,
    pub founding_member_cap: u32,
    pub projection_months: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            waterfall_lookback_months: 12,
            nrr_window_days: 90,
            churn_window_days: 30,
            customer_acquisition_cost_cents: 0,
            founding_member_cap: 1000,
            projection_months: 12,
        }
    }
}

/// Request parameters shared by both views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsParams {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub compare: bool,
    pub refresh: bool,
}

impl MetricsParams {
    /// Cache key; `refresh` is deliberately not part of it.
    pub fn cache_key(&self, view: &str) -> String {
        let bound = |t: Option<Timestamp>| {
            t.map(|t| t.as_unix_secs().to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        format!(
            "billing:{}:from={}:to={}:compare={}",
            view,
            bound(self.from),
            bound(self.to),
            self.compare
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundingMemberSummary {
    pub claimed: u32,
    pub cap: u32,
    pub remaining: u32,
}

/// Current window against the window of equal length before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub previous_window_start: Timestamp,
    pub previous_window_end: Timestamp,
    pub previous_mrr_cents: i64,
    pub current_mrr_cents: i64,
    /// `None` when the previous window had no MRR.
    pub mrr_change_percent: Option<f64>,
    pub previous_churn: ChurnReport,
    /// Percentage-point change in churn rate.
    pub churn_rate_change_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingMetrics {
    pub generated_at: Timestamp,
    pub window_start: Timestamp,
    pub window_end: Timestamp,
    pub snapshot: SubscriptionSnapshot,
    pub founding_members: FoundingMemberSummary,
    pub churn: ChurnReport,
    pub retention: RetentionReport,
    pub ltv: LtvReport,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comparison: Option<PeriodComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueMetrics {
    pub generated_at: Timestamp,
    pub current_mrr_cents: i64,
    pub waterfall: Vec<MonthlyMrr>,
    pub growth_rate_percent: f64,
    pub projection: RevenueProjection,
    pub cohorts: Vec<CohortRevenue>,
}

pub struct MetricsAggregator {
    repository: Arc<dyn SubscriptionRepository>,
    ledger: Arc<dyn SubscriptionLedger>,
    founding_slots: Arc<dyn FoundingMemberSlots>,
    cache: Arc<dyn MetricsCache>,
    config: MetricsConfig,
}

impl MetricsAggregator {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        ledger: Arc<dyn SubscriptionLedger>,
        founding_slots: Arc<dyn FoundingMemberSlots>,
        cache: Arc<dyn MetricsCache>,
        config: MetricsConfig,
    ) -> Self {
        Self {
            repository,
            ledger,
            founding_slots,
            cache,
            config,
        }
    }

    /// Snapshot, founding summary, churn, retention, and LTV.
    pub async fn metrics(
        &self,
        params: &MetricsParams,
        now: Timestamp,
    ) -> Result<BillingMetrics, DomainError> {
        let key = params.cache_key("metrics");
        self.cached(&key, params.refresh, || self.compute_metrics(params, now))
            .await
    }

    /// Waterfall, growth, projection, and cohorts.
    pub async fn revenue(
        &self,
        params: &MetricsParams,
        now: Timestamp,
    ) -> Result<RevenueMetrics, DomainError> {
        let key = params.cache_key("revenue");
        self.cached(&key, params.refresh, || self.compute_revenue(params, now))
            .await
    }

    fn window(&self, params: &MetricsParams, now: Timestamp) -> (Timestamp, Timestamp) {
        let end = params.to.unwrap_or(now);
        let start = params
            .from
            .unwrap_or_else(|| end.minus_days(self.config.churn_window_days));
        (start, end)
    }

    async fn compute_metrics(
        &self,
        params: &MetricsParams,
        now: Timestamp,
    ) -> Result<BillingMetrics, DomainError> {
        let accounts = self.repository.list_all().await?;
        let entries = self.ledger.all().await?;
        let claimed = self.founding_slots.claimed_count().await?;
        let (window_start, window_end) = self.window(params, now);

        let snapshot = SubscriptionSnapshot::from_accounts(&accounts);
        let churn = churn_rate(&entries, window_start, window_end);
        let nrr_start = params
            .from
            .unwrap_or_else(|| window_end.minus_days(self.config.nrr_window_days));
        let retention = net_revenue_retention(&accounts, &entries, nrr_start);
        let ltv = lifetime_value(
            snapshot.current_mrr_cents,
            snapshot.paying_accounts,
            churn.monthly_rate,
            self.config.customer_acquisition_cost_cents,
        );

        let comparison = params.compare.then(|| {
            let span = window_end.duration_since(&window_start);
            let previous_start = Timestamp::from_datetime(*window_start.as_datetime() - span);
            let previous_churn = churn_rate(&entries, previous_start, window_start);
            let previous_mrr_cents = LedgerReplay::until(&entries, window_start).total_mrr_cents();
            let current_mrr_cents = LedgerReplay::until(&entries, window_end).total_mrr_cents();

            PeriodComparison {
                previous_window_start: previous_start,
                previous_window_end: window_start,
                previous_mrr_cents,
                current_mrr_cents,
                mrr_change_percent: (previous_mrr_cents > 0).then(|| {
                    (current_mrr_cents - previous_mrr_cents) as f64 / previous_mrr_cents as f64
                        * 100.0
                }),
                churn_rate_change_points: (churn.rate - previous_churn.rate) * 100.0,
                previous_churn,
            }
        });

        tracing::debug!(
            accounts = accounts.len(),
            ledger_entries = entries.len(),
            mrr_cents = snapshot.current_mrr_cents,
            "Computed billing metrics"
        );

        Ok(BillingMetrics {
            generated_at: now,
            window_start,
            window_end,
            founding_members: FoundingMemberSummary {
                claimed,
                cap: self.config.founding_member_cap,
                remaining: self.config.founding_member_cap.saturating_sub(claimed),
            },
            snapshot,
            churn,
            retention,
            ltv,
            comparison,
        })
    }

    async fn compute_revenue(
        &self,
        params: &MetricsParams,
        now: Timestamp,
    ) -> Result<RevenueMetrics, DomainError> {
        let accounts = self.repository.list_all().await?;
        let entries = self.ledger.all().await?;
        let (_, window_end) = self.window(params, now);

        let months = self.config.waterfall_lookback_months.max(1);
        let first_month = sub_months(window_end.month_start(), months - 1);
        let waterfall = build_waterfall(&entries, first_month, months);
        let growth_rate_percent = average_growth_rate(&waterfall);
        let current_mrr_cents = crate::domain::revenue::current_mrr_cents(&accounts);

        Ok(RevenueMetrics {
            generated_at: now,
            current_mrr_cents,
            projection: project_revenue(
                current_mrr_cents,
                growth_rate_percent,
                self.config.projection_months,
            ),
            growth_rate_percent,
            waterfall,
            cohorts: revenue_by_cohort(&accounts),
        })
    }

    async fn cached<T, F, Fut>(&self, key: &str, refresh: bool, compute: F) -> Result<T, DomainError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        if refresh {
            if let Err(e) = self.cache.invalidate(key).await {
                tracing::warn!(key, error = %e, "Metrics cache invalidation failed");
            }
        } else {
            match self.cache.get(key).await {
                Ok(Some(value)) => match serde_json::from_value(value) {
                    Ok(view) => {
                        tracing::debug!(key, "Metrics cache hit");
                        return Ok(view);
                    }
                    Err(e) => tracing::warn!(key, error = %e, "Discarding undecodable cache entry"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(key, error = %e, "Metrics cache read failed"),
            }
        }

        let view = compute().await?;
        match serde_json::to_value(&view) {
            Ok(value) => {
                if let Err(e) = self.cache.put(key, value, self.config.cache_ttl).await {
                    tracing::warn!(key, error = %e, "Metrics cache write failed");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "Metrics view not serializable"),
        }
        Ok(view)
    }
}
