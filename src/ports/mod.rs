//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Subscription State
//!
//! - `SubscriptionRepository` - Account projection writes (reconciler only)
//! - `SubscriptionReader` - `{tier, status}` reads for feature gating
//! - `SubscriptionLedger` - Append-only, content-addressed event log
//!
//! ## Concurrency Primitives
//!
//! - `FoundingMemberSlots` - Capped, serializable slot allocation
//! - `DeliveryRecordStore` - Short-lived claims serializing concurrent deliveries
//!
//! ## Side Effects and Infrastructure
//!
//! - `NotificationSender` - Welcome and cancellation messages
//! - `MetricsCache` - TTL cache for computed metrics views
//! - `RateLimiter` - Per-IP limits on the webhook endpoint
//! - `Sleeper` - Injected delays for retry policies

mod delivery_record_store;
mod founding_member_slots;
mod metrics_cache;
mod notification_sender;
mod rate_limiter;
mod sleeper;
mod subscription_ledger;
mod subscription_reader;
mod subscription_repository;

pub use delivery_record_store::{
    ClaimOutcome, DeliveryKey, DeliveryRecordStore, DEFAULT_DELIVERY_FRESHNESS,
};
pub use founding_member_slots::FoundingMemberSlots;
pub use metrics_cache::{CacheError, MetricsCache};
pub use notification_sender::{Notification, NotificationError, NotificationSender};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};
pub use sleeper::Sleeper;
pub use subscription_ledger::{
    AppendOutcome, LedgerQuery, SubscriptionLedger, DEFAULT_LEDGER_LIMIT, MAX_LEDGER_LIMIT,
};
pub use subscription_reader::SubscriptionReader;
pub use subscription_repository::{InsertResult, SubscriptionRepository};
