//! In-memory account subscription store.
//!
//! Implements both the write-side repository and the read-side reader over a
//! single map. Useful for tests and local development.
//!
//! The store owns the ledger it commits into (`ledger()` hands out a clone
//! sharing the same entries), so `update_with_entry` appends and writes the
//! row while holding the account lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::InMemorySubscriptionLedger;
use crate::domain::billing::{AccountSubscription, SubscriptionAccess, SubscriptionEvent};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{
    AppendOutcome, InsertResult, SubscriptionLedger, SubscriptionReader, SubscriptionRepository,
};

#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    accounts: Arc<RwLock<HashMap<UserId, AccountSubscription>>>,
    ledger: InMemorySubscriptionLedger,
    /// Number of upcoming `update` calls that fail with a database error.
    failing_updates: Arc<AtomicU32>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store committing ledger entries into `ledger`.
    pub fn with_ledger(ledger: InMemorySubscriptionLedger) -> Self {
        Self {
            ledger,
            ..Self::default()
        }
    }

    /// The ledger `update_with_entry` appends to.
    pub fn ledger(&self) -> InMemorySubscriptionLedger {
        self.ledger.clone()
    }

    /// Makes the next `count` updates fail (for exercising retry paths).
    pub fn fail_next_updates(&self, count: u32) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    /// Seeds a row directly, bypassing version checks.
    pub async fn seed(&self, account: AccountSubscription) {
        self.accounts
            .write()
            .await
            .insert(account.user_id.clone(), account);
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionStore {
    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<AccountSubscription>, DomainError> {
        Ok(self.accounts.read().await.get(user_id).cloned())
    }

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> Result<Option<AccountSubscription>, DomainError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.external_customer_ref.as_deref() == Some(customer_ref))
            .cloned())
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<AccountSubscription>, DomainError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.external_subscription_ref.as_deref() == Some(subscription_ref))
            .cloned())
    }

    async fn insert(&self, account: &AccountSubscription) -> Result<InsertResult, DomainError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.user_id) {
            return Ok(InsertResult::AlreadyExists);
        }
        accounts.insert(account.user_id.clone(), account.clone());
        Ok(InsertResult::Inserted)
    }

    async fn update(&self, account: &AccountSubscription) -> Result<u64, DomainError> {
        if self.take_injected_failure() {
            return Err(DomainError::database("injected update failure"));
        }

        let mut accounts = self.accounts.write().await;
        write_row(&mut accounts, account)
    }

    async fn update_with_entry(
        &self,
        account: &AccountSubscription,
        entry: &SubscriptionEvent,
    ) -> Result<(u64, AppendOutcome), DomainError> {
        if self.take_injected_failure() {
            return Err(DomainError::database("injected update failure"));
        }

        let mut accounts = self.accounts.write().await;
        check_version(&accounts, account)?;
        let appended = self.ledger.append(entry).await?;
        let version = write_row(&mut accounts, account)?;
        Ok((version, appended))
    }

    async fn list_all(&self) -> Result<Vec<AccountSubscription>, DomainError> {
        let accounts = self.accounts.read().await;
        let mut all: Vec<AccountSubscription> = accounts.values().cloned().collect();
        all.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(all)
    }
}

fn check_version(
    accounts: &HashMap<UserId, AccountSubscription>,
    account: &AccountSubscription,
) -> Result<(), DomainError> {
    let stored = accounts.get(&account.user_id).ok_or_else(|| {
        DomainError::new(
            ErrorCode::SubscriptionNotFound,
            format!("no subscription row for {}", account.user_id),
        )
    })?;

    if stored.version != account.version {
        return Err(DomainError::new(
            ErrorCode::ConcurrentModification,
            format!(
                "stale write for {}: expected version {}, found {}",
                account.user_id, account.version, stored.version
            ),
        ));
    }
    Ok(())
}

fn write_row(
    accounts: &mut HashMap<UserId, AccountSubscription>,
    account: &AccountSubscription,
) -> Result<u64, DomainError> {
    check_version(accounts, account)?;
    let mut next = account.clone();
    next.version = account.version + 1;
    accounts.insert(account.user_id.clone(), next);
    Ok(account.version + 1)
}

#[async_trait]
impl SubscriptionReader for InMemorySubscriptionStore {
    async fn access(&self, user_id: &UserId) -> Result<SubscriptionAccess, DomainError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(user_id)
            .map(AccountSubscription::access)
            .unwrap_or_else(SubscriptionAccess::free))
    }
}
