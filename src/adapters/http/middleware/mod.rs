//! HTTP middleware for axum.
//!
//! This module contains middleware layers for cross-cutting concerns:
//!
//! - `admin_auth` - Admin JWT validation for the billing admin API
//! - `rate_limit` - Per-IP limiting on the billing webhook

pub mod admin_auth;
pub mod rate_limit;

pub use admin_auth::{
    admin_auth_middleware, AdminAuthRejection, AdminAuthState, AdminClaims, AdminPrincipal,
    AdminTokenVerifier, ADMIN_ROLE,
};
pub use rate_limit::{webhook_rate_limit_middleware, RateLimiterState};
