//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `billing` - Subscription lifecycle, webhook verification, ledger entries
//! - `revenue` - Pure revenue computations over the ledger and projection

pub mod billing;
pub mod foundation;
pub mod revenue;
