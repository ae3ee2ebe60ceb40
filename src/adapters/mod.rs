//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `cache` - Metrics cache (in-memory, Redis)
//! - `http` - axum routers and middleware
//! - `memory` - In-memory persistence for tests and local development
//! - `notifications` - Welcome and cancellation senders (Resend, logging)
//! - `postgres` - PostgreSQL persistence via sqlx
//! - `rate_limiter` - Fixed-window rate limiter
//! - `sleeper` - Tokio-backed and recording sleepers

pub mod cache;
pub mod http;
pub mod memory;
pub mod notifications;
pub mod postgres;
pub mod rate_limiter;
pub mod sleeper;
