//! In-memory adapters for tests and local development.
//!
//! State lives behind `Arc<tokio::sync::{RwLock, Mutex}>`, so clones share
//! the same underlying data.

mod delivery_records;
mod founding_member_slots;
mod ledger;
mod subscription_store;

pub use delivery_records::InMemoryDeliveryRecordStore;
pub use founding_member_slots::InMemoryFoundingMemberSlots;
pub use ledger::InMemorySubscriptionLedger;
pub use subscription_store::InMemorySubscriptionStore;
