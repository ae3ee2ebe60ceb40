//! Subscription reader port (read side).
//!
//! The only surface other feature areas use: `{tier, status}` for gating.
//! They never read the ledger or write subscription state.

use async_trait::async_trait;

use crate::domain::billing::SubscriptionAccess;
use crate::domain::foundation::{DomainError, UserId};

#[async_trait]
pub trait SubscriptionReader: Send + Sync {
    /// Current access level of a user.
    ///
    /// Users without a row read as free/active.
    async fn access(&self, user_id: &UserId) -> Result<SubscriptionAccess, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_reader_is_object_safe() {
        fn _accepts_dyn(_reader: &dyn SubscriptionReader) {}
    }
}
