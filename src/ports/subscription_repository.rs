//! Subscription repository port (write side).
//!
//! Persists the `AccountSubscription` projection. Only the reconciler writes
//! through this port.
//!
//! # Design
//!
//! - **One row per user**: `insert` reports `AlreadyExists` instead of failing
//! - **Optimistic locking**: `update` succeeds only if the stored version still
//!   equals `account.version`, and bumps it
//! - **Ledger and projection together**: `update_with_entry` appends the ledger
//!   entry describing the write in the same unit of work, so a rejected update
//!   never leaves a ledger entry behind
//!
//! # Example
//!
//! ```ignore
//! async fn ensure_account(
//!     repo: &dyn SubscriptionRepository,
//!     user_id: &UserId,
//! ) -> Result<AccountSubscription, DomainError> {
//!     if let Some(existing) = repo.find_by_user(user_id).await? {
//!         return Ok(existing);
//!     }
//!     let account = AccountSubscription::new_free(user_id.clone(), Timestamp::now());
//!     match repo.insert(&account).await? {
//!         InsertResult::Inserted => Ok(account),
//!         InsertResult::AlreadyExists => repo
//!             .find_by_user(user_id)
//!             .await?
//!             .ok_or_else(|| DomainError::database("row vanished after conflict")),
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::billing::{AccountSubscription, SubscriptionEvent};
use crate::domain::foundation::{DomainError, UserId};

use super::AppendOutcome;

/// Result of inserting a new account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    Inserted,
    /// Another writer created the row first.
    AlreadyExists,
}

/// Repository port for account subscription persistence.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find the account row of a user.
    async fn find_by_user(&self, user_id: &UserId)
        -> Result<Option<AccountSubscription>, DomainError>;

    /// Find the account bound to a processor customer reference.
    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> Result<Option<AccountSubscription>, DomainError>;

    /// Find the account currently on a processor subscription reference.
    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<AccountSubscription>, DomainError>;

    /// Insert a new row.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, account: &AccountSubscription) -> Result<InsertResult, DomainError>;

    /// Write an updated row, returning the new version.
    ///
    /// # Errors
    ///
    /// - `ConcurrentModification` if the stored version differs from `account.version`
    /// - `SubscriptionNotFound` if the row does not exist
    /// - `DatabaseError` on persistence failure
    async fn update(&self, account: &AccountSubscription) -> Result<u64, DomainError>;

    /// Appends `entry` to the ledger and writes the row atomically.
    ///
    /// Returns the new version and whether the entry was new. An entry whose
    /// fingerprint is already recorded does not block the row write.
    ///
    /// # Errors
    ///
    /// Same as `update`; on any error neither write is kept.
    async fn update_with_entry(
        &self,
        account: &AccountSubscription,
        entry: &SubscriptionEvent,
    ) -> Result<(u64, AppendOutcome), DomainError>;

    /// Every account row; used by the metrics aggregator.
    async fn list_all(&self) -> Result<Vec<AccountSubscription>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn SubscriptionRepository) {}
    }
}
