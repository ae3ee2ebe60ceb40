//! In-memory webhook delivery record store.
//!
//! Every claim prunes records older than the freshness window, so the map only
//! holds claims that can still block a delivery.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ClaimOutcome, DeliveryKey, DeliveryRecordStore};

#[derive(Debug, Clone, Default)]
pub struct InMemoryDeliveryRecordStore {
    records: Arc<Mutex<HashMap<DeliveryKey, Timestamp>>>,
}

impl InMemoryDeliveryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl DeliveryRecordStore for InMemoryDeliveryRecordStore {
    async fn claim(
        &self,
        key: &DeliveryKey,
        now: Timestamp,
        freshness: Duration,
    ) -> Result<ClaimOutcome, DomainError> {
        let mut records = self.records.lock().await;
        records.retain(|_, claimed_at| now.is_before(&claimed_at.plus_secs(freshness.as_secs())));
        if records.contains_key(key) {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        records.insert(key.clone(), now);
        Ok(ClaimOutcome::Claimed)
    }

    async fn release(&self, key: &DeliveryKey) -> Result<(), DomainError> {
        self.records.lock().await.remove(key);
        Ok(())
    }
}
