//! Axum router configuration for billing endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::super::middleware::{admin_auth_middleware, webhook_rate_limit_middleware};
use super::handlers::{get_admin_billing, get_subscription, handle_billing_webhook, BillingAppState};

/// Webhook routes: no user auth, signature verified, rate limited per IP.
///
/// - `POST /billing`
pub fn webhook_routes(state: &BillingAppState) -> Router<BillingAppState> {
    Router::new()
        .route("/billing", post(handle_billing_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            webhook_rate_limit_middleware,
        ))
}

/// Admin routes: require an admin session token.
///
/// - `GET /billing`
pub fn admin_routes(state: &BillingAppState) -> Router<BillingAppState> {
    Router::new()
        .route("/billing", get(get_admin_billing))
        .route_layer(middleware::from_fn_with_state(
            state.admin_verifier.clone(),
            admin_auth_middleware,
        ))
}

/// Complete billing router, mounted under `/api`.
///
/// # Routes
/// - `POST /api/webhooks/billing` - Billing processor webhooks
/// - `GET /api/admin/billing` - Metrics, ledger, and revenue views
/// - `GET /api/subscription` - `{tier, status}` for the calling user
pub fn billing_router(state: BillingAppState) -> Router {
    let api = Router::new()
        .nest("/webhooks", webhook_routes(&state))
        .nest("/admin", admin_routes(&state))
        .route("/subscription", get(get_subscription));

    Router::new().nest("/api", api).with_state(state)
}
