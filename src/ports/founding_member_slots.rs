//! FoundingMemberSlots port - capped, sequential founding-member numbers.
//!
//! ## Concurrency Contract
//!
//! `claim` must behave as a serializable increment: two concurrent claims never
//! receive the same number, numbers are handed out contiguously from 1, and no
//! claim succeeds once `cap` numbers exist. Claims are keyed by user; claiming
//! again for a user that already holds a number returns that number without
//! consuming another slot.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait FoundingMemberSlots: Send + Sync {
    /// Claim a slot for `user_id`.
    ///
    /// Returns `Ok(None)` when all `cap` slots are taken; that is an expected
    /// outcome, not an error.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` if the backing store fails
    async fn claim(&self, user_id: &UserId, cap: u32) -> Result<Option<u32>, DomainError>;

    /// Number of slots handed out so far.
    async fn claimed_count(&self) -> Result<u32, DomainError>;
}
