//! Household Billing - Subscription Lifecycle Reconciliation
//!
//! Consumes at-least-once billing webhooks, keeps one subscription projection
//! per household account, allocates founding-member slots, and derives revenue
//! metrics from the append-only subscription ledger.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
