//! HTTP handlers for billing endpoints.
//!
//! These handlers connect axum routes to the billing application handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::handlers::{
    GetSubscriptionAccessHandler, GetSubscriptionAccessQuery, HandleBillingWebhookCommand,
    HandleBillingWebhookHandler, ListLedgerEventsHandler, ListLedgerEventsQuery,
    MetricsAggregator, ReconcileOutcome,
};
use crate::domain::billing::{WebhookError, SIGNATURE_HEADERS};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{RateLimiter, SubscriptionLedger, SubscriptionReader};

use super::super::middleware::{AdminPrincipal, AdminTokenVerifier};
use super::dto::{
    AdminBillingQuery, AdminBillingResponse, ErrorResponse, SubscriptionAccessResponse,
    WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the billing routes.
#[derive(Clone)]
pub struct BillingAppState {
    pub webhook_handler: Arc<HandleBillingWebhookHandler>,
    pub subscription_reader: Arc<dyn SubscriptionReader>,
    pub ledger: Arc<dyn SubscriptionLedger>,
    pub metrics: Arc<MetricsAggregator>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub admin_verifier: Arc<AdminTokenVerifier>,
}

impl BillingAppState {
    pub fn access_handler(&self) -> GetSubscriptionAccessHandler {
        GetSubscriptionAccessHandler::new(self.subscription_reader.clone())
    }

    pub fn ledger_handler(&self) -> ListLedgerEventsHandler {
        ListLedgerEventsHandler::new(self.ledger.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity for feature-area reads, taken from `X-User-Id`.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: UserId,
}

pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(UserContext { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook
// ════════════════════════════════════════════════════════════════════════════════

/// First signature header present, in processor-version order.
fn signature_header(headers: &HeaderMap) -> Option<String> {
    SIGNATURE_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// POST /api/webhooks/billing - Verify, normalize, and reconcile one delivery
pub async fn handle_billing_webhook(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature: signature_header(&headers),
    };

    let outcome = state.webhook_handler.handle(cmd).await?;

    match &outcome {
        ReconcileOutcome::Applied {
            user_id,
            transition,
            founding_member_number,
        } => tracing::info!(
            outcome = outcome.as_str(),
            user_id = %user_id,
            from_tier = %transition.from_plan.tier,
            to_tier = %transition.to_plan.tier,
            founding_member_number = ?founding_member_number,
            "Webhook processed"
        ),
        _ => tracing::info!(outcome = outcome.as_str(), "Webhook processed"),
    }

    Ok((StatusCode::OK, Json(WebhookAckResponse::from(&outcome))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Queries
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscription - `{tier, status}` for the calling user
pub async fn get_subscription(
    State(state): State<BillingAppState>,
    user: UserContext,
) -> Result<impl IntoResponse, BillingApiError> {
    let access = state
        .access_handler()
        .handle(GetSubscriptionAccessQuery {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(SubscriptionAccessResponse::from(access)))
}

/// GET /api/admin/billing - Metrics, ledger events, and revenue views (admin only)
pub async fn get_admin_billing(
    State(state): State<BillingAppState>,
    Extension(admin): Extension<AdminPrincipal>,
    Query(query): Query<AdminBillingQuery>,
) -> Result<impl IntoResponse, BillingApiError> {
    let view = query.view()?;
    let params = query.metrics_params()?;
    let now = Timestamp::now();

    tracing::debug!(admin = %admin.subject, ?view, refresh = params.refresh, "Admin billing read");

    let mut response = AdminBillingResponse::default();

    if view.includes_metrics() {
        response.metrics = Some(state.metrics.metrics(&params, now).await?);
    }
    if view.includes_events() {
        let page = state
            .ledger_handler()
            .handle(ListLedgerEventsQuery {
                filter: query.ledger_query()?,
            })
            .await?;
        response.events = Some(page);
    }
    if view.includes_revenue() {
        response.revenue = Some(state.metrics.revenue(&params, now).await?);
    }

    Ok(Json(response))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts billing errors to HTTP responses.
#[derive(Debug)]
pub enum BillingApiError {
    Webhook(WebhookError),
    Domain(DomainError),
}

impl From<WebhookError> for BillingApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<DomainError> for BillingApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            BillingApiError::Webhook(err) => {
                let status = err.status_code();
                if status.is_server_error() {
                    tracing::error!(code = err.code(), error = %err, "Webhook processing failed, processor will redeliver");
                }
                (status, ErrorResponse::new(err.code(), err.to_string()))
            }
            BillingApiError::Domain(err) => {
                let status = match err.code {
                    ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
                    ErrorCode::SubscriptionNotFound => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(code = %err.code, error = %err.message, "Billing request failed");
                }
                (status, ErrorResponse::new(err.code.to_string(), err.message))
            }
        };

        (status, Json(body)).into_response()
    }
}
