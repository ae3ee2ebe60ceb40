//! GetSubscriptionAccessHandler - `{tier, status}` read for feature gating.

use std::sync::Arc;

use crate::domain::billing::SubscriptionAccess;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::SubscriptionReader;

#[derive(Debug, Clone)]
pub struct GetSubscriptionAccessQuery {
    pub user_id: UserId,
}

pub struct GetSubscriptionAccessHandler {
    reader: Arc<dyn SubscriptionReader>,
}

impl GetSubscriptionAccessHandler {
    pub fn new(reader: Arc<dyn SubscriptionReader>) -> Self {
        Self { reader }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionAccessQuery,
    ) -> Result<SubscriptionAccess, DomainError> {
        self.reader.access(&query.user_id).await
    }
}
