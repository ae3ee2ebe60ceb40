//! PostgreSQL webhook delivery records.
//!
//! A claim inserts the `(subscription_ref, status)` row, or takes over an
//! existing row whose `claimed_at` is older than the freshness window. Zero
//! affected rows means another delivery holds a fresh claim. Rows past the
//! window are deleted on every claim, so the table only holds live claims.

use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ClaimOutcome, DeliveryKey, DeliveryRecordStore};

pub struct PostgresDeliveryRecordStore {
    pool: PgPool,
}

impl PostgresDeliveryRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryRecordStore for PostgresDeliveryRecordStore {
    async fn claim(
        &self,
        key: &DeliveryKey,
        now: Timestamp,
        freshness: Duration,
    ) -> Result<ClaimOutcome, DomainError> {
        let stale_before =
            *now.as_datetime() - chrono::Duration::seconds(freshness.as_secs() as i64);

        sqlx::query("DELETE FROM webhook_delivery_records WHERE claimed_at <= $1")
            .bind(stale_before)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to prune deliveries: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO webhook_delivery_records (subscription_ref, status, claimed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (subscription_ref, status) DO UPDATE
                SET claimed_at = EXCLUDED.claimed_at
                WHERE webhook_delivery_records.claimed_at <= $4
            "#,
        )
        .bind(&key.subscription_ref)
        .bind(key.status.as_str())
        .bind(now.as_datetime())
        .bind(stale_before)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to claim delivery: {}", e)))?;

        Ok(if result.rows_affected() == 0 {
            ClaimOutcome::AlreadyClaimed
        } else {
            ClaimOutcome::Claimed
        })
    }

    async fn release(&self, key: &DeliveryKey) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM webhook_delivery_records WHERE subscription_ref = $1 AND status = $2")
            .bind(&key.subscription_ref)
            .bind(key.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to release delivery: {}", e)))?;
        Ok(())
    }
}
