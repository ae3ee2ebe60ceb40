//! ListLedgerEventsHandler - paged, filtered view of the subscription ledger.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::SubscriptionEvent;
use crate::domain::foundation::DomainError;
use crate::ports::{LedgerQuery, SubscriptionLedger};

#[derive(Debug, Clone, Default)]
pub struct ListLedgerEventsQuery {
    pub filter: LedgerQuery,
}

/// One page of ledger entries, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerPage {
    pub events: Vec<SubscriptionEvent>,
    /// Entries matching the filter across all pages.
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

pub struct ListLedgerEventsHandler {
    ledger: Arc<dyn SubscriptionLedger>,
}

impl ListLedgerEventsHandler {
    pub fn new(ledger: Arc<dyn SubscriptionLedger>) -> Self {
        Self { ledger }
    }

    pub async fn handle(&self, query: ListLedgerEventsQuery) -> Result<LedgerPage, DomainError> {
        let filter = query.filter.clone().with_limit(query.filter.limit);
        let events = self.ledger.list(&filter).await?;
        let total = self.ledger.count(&filter).await?;

        Ok(LedgerPage {
            events,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }
}
