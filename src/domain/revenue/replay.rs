//! Ledger replay.
//!
//! Walks ledger entries in write order and tracks, per user, the monthly
//! recurring revenue and lifecycle status each entry leaves behind. Every
//! other revenue view is built on these per-user series so the numbers stay
//! consistent with one another.

use std::collections::HashMap;

use crate::domain::billing::{SubscriptionEvent, SubscriptionEventType};
use crate::domain::foundation::{Timestamp, UserId};

/// Replayed lifecycle state of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayedStatus {
    Active,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayedAccount {
    pub mrr_cents: i64,
    pub status: ReplayedStatus,
}

/// MRR an entry leaves the user at, or `None` if it changes nothing.
pub fn mrr_after(entry: &SubscriptionEvent) -> Option<i64> {
    if entry.is_duplicate_marker() {
        return None;
    }
    match entry.event_type {
        SubscriptionEventType::CheckoutSucceeded => None,
        t if t.is_cancellation() => Some(0),
        _ => Some(entry.to_plan().monthly_rate_cents()),
    }
}

fn status_after(entry: &SubscriptionEvent) -> Option<ReplayedStatus> {
    if entry.is_duplicate_marker() {
        return None;
    }
    match entry.event_type {
        SubscriptionEventType::CheckoutSucceeded => None,
        t if t.is_cancellation() => Some(ReplayedStatus::Canceled),
        _ => Some(ReplayedStatus::Active),
    }
}

/// Returns entries sorted by write time; ties keep input order.
pub fn chronological(entries: &[SubscriptionEvent]) -> Vec<&SubscriptionEvent> {
    let mut sorted: Vec<&SubscriptionEvent> = entries.iter().collect();
    sorted.sort_by_key(|e| e.created_at);
    sorted
}

/// Incremental per-user replay state.
#[derive(Debug, Clone, Default)]
pub struct LedgerReplay {
    accounts: HashMap<UserId, ReplayedAccount>,
}

impl LedgerReplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays every entry written strictly before `at`.
    pub fn until(entries: &[SubscriptionEvent], at: Timestamp) -> Self {
        let mut replay = Self::new();
        for entry in chronological(entries) {
            if !entry.created_at.is_before(&at) {
                break;
            }
            replay.apply(entry);
        }
        replay
    }

    /// Applies one entry and returns `(previous, next)` MRR if it changed the user.
    pub fn apply(&mut self, entry: &SubscriptionEvent) -> Option<(i64, i64)> {
        let next_mrr = mrr_after(entry)?;
        let next_status = status_after(entry)?;
        let previous = self
            .accounts
            .insert(
                entry.user_id.clone(),
                ReplayedAccount {
                    mrr_cents: next_mrr,
                    status: next_status,
                },
            )
            .map(|a| a.mrr_cents)
            .unwrap_or(0);
        Some((previous, next_mrr))
    }

    pub fn mrr_of(&self, user_id: &UserId) -> i64 {
        self.accounts.get(user_id).map(|a| a.mrr_cents).unwrap_or(0)
    }

    pub fn total_mrr_cents(&self) -> i64 {
        self.accounts.values().map(|a| a.mrr_cents).sum()
    }

    /// Accounts that are active or canceled at this point of the replay.
    pub fn subscribed_or_canceled(&self) -> usize {
        self.accounts.len()
    }

    pub fn count_with_status(&self, status: ReplayedStatus) -> usize {
        self.accounts.values().filter(|a| a.status == status).count()
    }
}
