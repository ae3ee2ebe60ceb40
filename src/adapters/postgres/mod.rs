//! PostgreSQL adapters - Database implementations for the billing ports.
//!
//! - `PostgresSubscriptionRepository` - Account projection (also the reader)
//! - `PostgresSubscriptionLedger` - Content-addressed event ledger
//! - `PostgresFoundingMemberSlots` - Row-locked founding counter
//! - `PostgresDeliveryRecordStore` - Webhook delivery claims

mod delivery_records;
mod founding_member_slots;
mod ledger;
mod subscription_repository;

pub use delivery_records::PostgresDeliveryRecordStore;
pub use founding_member_slots::PostgresFoundingMemberSlots;
pub use ledger::PostgresSubscriptionLedger;
pub use subscription_repository::PostgresSubscriptionRepository;
