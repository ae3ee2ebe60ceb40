//! HTTP adapter for billing endpoints.
//!
//! - `POST /api/webhooks/billing` - Billing processor webhooks
//! - `GET /api/admin/billing` - Admin metrics, ledger, and revenue views
//! - `GET /api/subscription` - Feature-area `{tier, status}` read

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{BillingApiError, BillingAppState, UserContext};
pub use routes::billing_router;
