//! SubscriptionLedger port - append-only log of subscription events.
//!
//! Entries are never updated or deleted; corrections are new entries. The
//! ledger refuses a second entry with the same fingerprint so a retried write
//! of the same transition is a no-op.

use async_trait::async_trait;

use crate::domain::billing::{SubscriptionEvent, SubscriptionEventType};
use crate::domain::foundation::{DomainError, Timestamp};

/// Default page size for ledger listings.
pub const DEFAULT_LEDGER_LIMIT: u32 = 50;

/// Largest page a caller may request.
pub const MAX_LEDGER_LIMIT: u32 = 500;

/// Result of appending an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// An entry with the same fingerprint already exists.
    AlreadyRecorded,
}

/// Filter and page for ledger listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerQuery {
    pub event_type: Option<SubscriptionEventType>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<Timestamp>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<Timestamp>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for LedgerQuery {
    fn default() -> Self {
        Self {
            event_type: None,
            from: None,
            to: None,
            limit: DEFAULT_LEDGER_LIMIT,
            offset: 0,
        }
    }
}

impl LedgerQuery {
    /// Clamps the limit into `1..=MAX_LEDGER_LIMIT`.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_LEDGER_LIMIT);
        self
    }

    /// True if the entry passes the filter (paging not applied).
    pub fn matches(&self, event: &SubscriptionEvent) -> bool {
        self.event_type.map_or(true, |t| event.event_type == t)
            && self.from.map_or(true, |from| !event.created_at.is_before(&from))
            && self.to.map_or(true, |to| event.created_at.is_before(&to))
    }
}

/// Port for the subscription event ledger.
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn append(&self, event: &SubscriptionEvent) -> Result<AppendOutcome, DomainError>;

    /// Filtered page of entries, newest first.
    async fn list(&self, query: &LedgerQuery) -> Result<Vec<SubscriptionEvent>, DomainError>;

    /// Number of entries matching the filter (paging ignored).
    async fn count(&self, query: &LedgerQuery) -> Result<u64, DomainError>;

    /// Every entry, oldest first; used for replay.
    async fn all(&self) -> Result<Vec<SubscriptionEvent>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{SubscriptionTier, TriggerSource};
    use crate::domain::foundation::UserId;
    use std::collections::BTreeMap;

    fn event(event_type: SubscriptionEventType, at: u64) -> SubscriptionEvent {
        SubscriptionEvent::record(
            UserId::new("user-1").unwrap(),
            event_type,
            SubscriptionTier::Free,
            SubscriptionTier::Pro,
            TriggerSource::Webhook,
            BTreeMap::new(),
            Timestamp::from_unix_secs(at),
        )
    }

    #[test]
    fn subscription_ledger_is_object_safe() {
        fn _accepts_dyn(_ledger: &dyn SubscriptionLedger) {}
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LedgerQuery::default().with_limit(0).limit, 1);
        assert_eq!(LedgerQuery::default().with_limit(10_000).limit, MAX_LEDGER_LIMIT);
    }

    #[test]
    fn query_filters_type_and_half_open_range() {
        let query = LedgerQuery {
            event_type: Some(SubscriptionEventType::SubscriptionCreated),
            from: Some(Timestamp::from_unix_secs(100)),
            to: Some(Timestamp::from_unix_secs(200)),
            ..LedgerQuery::default()
        };
        assert!(query.matches(&event(SubscriptionEventType::SubscriptionCreated, 100)));
        assert!(!query.matches(&event(SubscriptionEventType::SubscriptionCreated, 200)));
        assert!(!query.matches(&event(SubscriptionEventType::SubscriptionUpdated, 150)));
    }
}
