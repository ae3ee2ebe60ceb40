//! In-memory founding-member allocator.
//!
//! A single mutex guards the counter and the per-user claims, which makes
//! every claim a serializable increment on one node.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::FoundingMemberSlots;

#[derive(Debug, Default)]
struct SlotState {
    claimed: u32,
    by_user: HashMap<UserId, u32>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryFoundingMemberSlots {
    state: Arc<Mutex<SlotState>>,
}

impl InMemoryFoundingMemberSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number held by a user, if any.
    pub async fn number_of(&self, user_id: &UserId) -> Option<u32> {
        self.state.lock().await.by_user.get(user_id).copied()
    }
}

#[async_trait]
impl FoundingMemberSlots for InMemoryFoundingMemberSlots {
    async fn claim(&self, user_id: &UserId, cap: u32) -> Result<Option<u32>, DomainError> {
        let mut state = self.state.lock().await;

        if let Some(number) = state.by_user.get(user_id) {
            return Ok(Some(*number));
        }
        if state.claimed >= cap {
            return Ok(None);
        }

        state.claimed += 1;
        let number = state.claimed;
        state.by_user.insert(user_id.clone(), number);
        Ok(Some(number))
    }

    async fn claimed_count(&self) -> Result<u32, DomainError> {
        Ok(self.state.lock().await.claimed)
    }
}
