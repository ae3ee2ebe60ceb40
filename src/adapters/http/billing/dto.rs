//! HTTP DTOs for billing endpoints.
//!
//! Boundary types between HTTP and the application layer. Query strings are
//! parsed here into `MetricsParams` and `LedgerQuery`.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{
    BillingMetrics, LedgerPage, MetricsParams, ReconcileOutcome, RevenueMetrics,
};
use crate::domain::billing::{SubscriptionAccess, SubscriptionEventType};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{LedgerQuery, DEFAULT_LEDGER_LIMIT, MAX_LEDGER_LIMIT};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Which admin view(s) to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingView {
    Metrics,
    Events,
    Revenue,
    All,
}

impl BillingView {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "metrics" => Some(BillingView::Metrics),
            "events" => Some(BillingView::Events),
            "revenue" => Some(BillingView::Revenue),
            "all" => Some(BillingView::All),
            _ => None,
        }
    }

    pub fn includes_metrics(&self) -> bool {
        matches!(self, BillingView::Metrics | BillingView::All)
    }

    pub fn includes_events(&self) -> bool {
        matches!(self, BillingView::Events | BillingView::All)
    }

    pub fn includes_revenue(&self) -> bool {
        matches!(self, BillingView::Revenue | BillingView::All)
    }
}

/// Query string of `GET /api/admin/billing`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminBillingQuery {
    /// `metrics` (default), `events`, `revenue`, or `all`.
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
    /// RFC 3339 lower bound.
    #[serde(default)]
    pub from: Option<String>,
    /// RFC 3339 upper bound.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub refresh: bool,
    #[serde(default)]
    pub compare: bool,
}

impl AdminBillingQuery {
    pub fn view(&self) -> Result<BillingView, DomainError> {
        match self.view.as_deref() {
            None => Ok(BillingView::Metrics),
            Some(v) => BillingView::parse(v).ok_or_else(|| {
                DomainError::validation("view", format!("unknown view '{}'", v))
            }),
        }
    }

    pub fn metrics_params(&self) -> Result<MetricsParams, DomainError> {
        let from = parse_bound("from", self.from.as_deref())?;
        let to = parse_bound("to", self.to.as_deref())?;
        if let (Some(from), Some(to)) = (from, to) {
            if !from.is_before(&to) {
                return Err(DomainError::validation("from", "'from' must be before 'to'"));
            }
        }

        Ok(MetricsParams {
            from,
            to,
            compare: self.compare,
            refresh: self.refresh,
        })
    }

    pub fn ledger_query(&self) -> Result<LedgerQuery, DomainError> {
        let event_type = match self.event_type.as_deref() {
            None => None,
            Some(raw) => Some(SubscriptionEventType::parse(raw).ok_or_else(|| {
                DomainError::validation("event_type", format!("unknown event type '{}'", raw))
            })?),
        };

        Ok(LedgerQuery {
            event_type,
            from: parse_bound("from", self.from.as_deref())?,
            to: parse_bound("to", self.to.as_deref())?,
            limit: self.limit.unwrap_or(DEFAULT_LEDGER_LIMIT).clamp(1, MAX_LEDGER_LIMIT),
            offset: self.offset.unwrap_or(0),
        })
    }
}

fn parse_bound(field: &str, raw: Option<&str>) -> Result<Option<Timestamp>, DomainError> {
    raw.map(|value| {
        Timestamp::parse_rfc3339(value).ok_or_else(|| {
            DomainError::validation(field, format!("'{}' is not an RFC 3339 timestamp", value))
        })
    })
    .transpose()
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body returned with every 2xx webhook response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAckResponse {
    /// `applied`, `duplicate`, or `ignored`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub founding_member_number: Option<u32>,
}

impl From<&ReconcileOutcome> for WebhookAckResponse {
    fn from(outcome: &ReconcileOutcome) -> Self {
        let (reason, founding_member_number) = match outcome {
            ReconcileOutcome::Applied {
                founding_member_number,
                ..
            } => (None, *founding_member_number),
            ReconcileOutcome::Duplicate { .. } => (None, None),
            ReconcileOutcome::Ignored { reason } => (Some(reason.clone()), None),
        };

        Self {
            status: outcome.as_str().to_string(),
            reason,
            founding_member_number,
        }
    }
}

/// `{tier, status}` read contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionAccessResponse {
    pub tier: String,
    pub status: String,
}

impl From<SubscriptionAccess> for SubscriptionAccessResponse {
    fn from(access: SubscriptionAccess) -> Self {
        Self {
            tier: access.tier.as_str().to_string(),
            status: access.status.as_str().to_string(),
        }
    }
}

/// Admin billing response; only the requested views are present.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminBillingResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BillingMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<LedgerPage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<RevenueMetrics>,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{SubscriptionStatus, SubscriptionTier};
    use crate::domain::foundation::UserId;

    #[test]
    fn view_defaults_to_metrics() {
        assert_eq!(AdminBillingQuery::default().view().unwrap(), BillingView::Metrics);
    }

    #[test]
    fn unknown_view_is_rejected() {
        let query = AdminBillingQuery {
            view: Some("everything".into()),
            ..AdminBillingQuery::default()
        };
        assert!(query.view().is_err());
    }

    #[test]
    fn all_view_includes_every_section() {
        let all = BillingView::All;
        assert!(all.includes_metrics() && all.includes_events() && all.includes_revenue());
        assert!(!BillingView::Events.includes_metrics());
    }

    #[test]
    fn ledger_query_applies_defaults_and_clamps() {
        let query = AdminBillingQuery::default().ledger_query().unwrap();
        assert_eq!(query.limit, DEFAULT_LEDGER_LIMIT);
        assert_eq!(query.offset, 0);

        let big = AdminBillingQuery {
            limit: Some(9_999),
            ..AdminBillingQuery::default()
        };
        assert_eq!(big.ledger_query().unwrap().limit, MAX_LEDGER_LIMIT);
    }

    #[test]
    fn ledger_query_parses_event_type() {
        let query = AdminBillingQuery {
            event_type: Some("subscription_canceled".into()),
            ..AdminBillingQuery::default()
        };
        assert_eq!(
            query.ledger_query().unwrap().event_type,
            Some(SubscriptionEventType::SubscriptionCanceled)
        );

        let bad = AdminBillingQuery {
            event_type: Some("nope".into()),
            ..AdminBillingQuery::default()
        };
        assert!(bad.ledger_query().is_err());
    }

    #[test]
    fn metrics_params_reject_bad_timestamps_and_inverted_ranges() {
        let bad = AdminBillingQuery {
            from: Some("yesterday".into()),
            ..AdminBillingQuery::default()
        };
        assert!(bad.metrics_params().is_err());

        let inverted = AdminBillingQuery {
            from: Some("2026-03-01T00:00:00Z".into()),
            to: Some("2026-02-01T00:00:00Z".into()),
            ..AdminBillingQuery::default()
        };
        assert!(inverted.metrics_params().is_err());
    }

    #[test]
    fn ack_reports_founding_number_and_reason() {
        let ignored = WebhookAckResponse::from(&ReconcileOutcome::Ignored {
            reason: "unknown type".into(),
        });
        assert_eq!(ignored.status, "ignored");
        assert_eq!(ignored.reason.as_deref(), Some("unknown type"));

        let dup = WebhookAckResponse::from(&ReconcileOutcome::Duplicate {
            user_id: UserId::new("u").unwrap(),
        });
        assert_eq!(dup.status, "duplicate");
        assert!(dup.founding_member_number.is_none());
    }

    #[test]
    fn access_response_uses_wire_names() {
        let response = SubscriptionAccessResponse::from(SubscriptionAccess {
            tier: SubscriptionTier::Family,
            status: SubscriptionStatus::Canceled,
        });
        assert_eq!(response.tier, "family");
        assert_eq!(response.status, "canceled");
    }
}
