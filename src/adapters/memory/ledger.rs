//! In-memory subscription ledger.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::SubscriptionEvent;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{AppendOutcome, LedgerQuery, SubscriptionLedger};

#[derive(Debug, Default)]
struct LedgerState {
    /// Entries in append order.
    entries: Vec<SubscriptionEvent>,
    fingerprints: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemorySubscriptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    /// Entries of one user in append order.
    pub async fn for_user(&self, user_id: &UserId) -> Vec<SubscriptionEvent> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SubscriptionLedger for InMemorySubscriptionLedger {
    async fn append(&self, event: &SubscriptionEvent) -> Result<AppendOutcome, DomainError> {
        let mut state = self.state.write().await;
        if !state.fingerprints.insert(event.fingerprint.clone()) {
            return Ok(AppendOutcome::AlreadyRecorded);
        }
        state.entries.push(event.clone());
        Ok(AppendOutcome::Appended)
    }

    async fn list(&self, query: &LedgerQuery) -> Result<Vec<SubscriptionEvent>, DomainError> {
        let state = self.state.read().await;
        let mut matching: Vec<&SubscriptionEvent> =
            state.entries.iter().filter(|e| query.matches(e)).collect();
        // Newest first; append order breaks ties.
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, query: &LedgerQuery) -> Result<u64, DomainError> {
        let state = self.state.read().await;
        Ok(state.entries.iter().filter(|e| query.matches(e)).count() as u64)
    }

    async fn all(&self) -> Result<Vec<SubscriptionEvent>, DomainError> {
        let state = self.state.read().await;
        let mut entries = state.entries.clone();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }
}
