//! PostgreSQL subscription ledger.
//!
//! The `fingerprint` column is unique, so a retried append is a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::billing::{
    SubscriptionEvent, SubscriptionEventType, SubscriptionTier, TriggerSource,
};
use crate::domain::foundation::{DomainError, LedgerEntryId, Timestamp, UserId};
use crate::ports::{AppendOutcome, LedgerQuery, SubscriptionLedger};

/// Optional filters bound as `$1..$3`; NULL disables a filter.
const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR event_type = $1)
      AND ($2::timestamptz IS NULL OR created_at >= $2)
      AND ($3::timestamptz IS NULL OR created_at < $3)
"#;

pub struct PostgresSubscriptionLedger {
    pool: PgPool,
}

impl PostgresSubscriptionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    user_id: String,
    event_type: String,
    from_tier: String,
    to_tier: String,
    trigger_source: String,
    metadata: Json<BTreeMap<String, String>>,
    created_at: DateTime<Utc>,
    fingerprint: String,
}

impl TryFrom<EventRow> for SubscriptionEvent {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let invalid = |field: &str, value: &str| {
            DomainError::database(format!("Invalid {} value: {}", field, value))
        };

        Ok(SubscriptionEvent::reconstitute(
            LedgerEntryId::from_uuid(row.id),
            UserId::new(row.user_id)
                .map_err(|e| DomainError::database(format!("Invalid user_id: {}", e)))?,
            SubscriptionEventType::parse(&row.event_type)
                .ok_or_else(|| invalid("event_type", &row.event_type))?,
            SubscriptionTier::parse(&row.from_tier)
                .ok_or_else(|| invalid("from_tier", &row.from_tier))?,
            SubscriptionTier::parse(&row.to_tier).ok_or_else(|| invalid("to_tier", &row.to_tier))?,
            TriggerSource::parse(&row.trigger_source)
                .ok_or_else(|| invalid("trigger_source", &row.trigger_source))?,
            row.metadata.0,
            Timestamp::from_datetime(row.created_at),
            row.fingerprint,
        ))
    }
}

fn bounds(query: &LedgerQuery) -> (Option<&str>, Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    (
        query.event_type.map(|t| t.as_str()),
        query.from.map(|t| *t.as_datetime()),
        query.to.map(|t| *t.as_datetime()),
    )
}

/// Inserts one ledger row; shared with the repository's transactional commit.
pub(super) async fn insert_entry<'e, E>(
    executor: E,
    event: &SubscriptionEvent,
) -> Result<AppendOutcome, DomainError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO subscription_events (
            id, user_id, event_type, from_tier, to_tier, trigger_source,
            metadata, created_at, fingerprint
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (fingerprint) DO NOTHING
        "#,
    )
    .bind(event.id.as_uuid())
    .bind(event.user_id.as_str())
    .bind(event.event_type.as_str())
    .bind(event.from_tier.as_str())
    .bind(event.to_tier.as_str())
    .bind(event.trigger_source.as_str())
    .bind(Json(&event.metadata))
    .bind(event.created_at.as_datetime())
    .bind(&event.fingerprint)
    .execute(executor)
    .await
    .map_err(|e| DomainError::database(format!("Failed to append ledger entry: {}", e)))?;

    Ok(if result.rows_affected() == 0 {
        AppendOutcome::AlreadyRecorded
    } else {
        AppendOutcome::Appended
    })
}

#[async_trait]
impl SubscriptionLedger for PostgresSubscriptionLedger {
    async fn append(&self, event: &SubscriptionEvent) -> Result<AppendOutcome, DomainError> {
        insert_entry(&self.pool, event).await
    }

    async fn list(&self, query: &LedgerQuery) -> Result<Vec<SubscriptionEvent>, DomainError> {
        let (event_type, from, to) = bounds(query);
        let sql = format!(
            "SELECT id, user_id, event_type, from_tier, to_tier, trigger_source, metadata, \
             created_at, fingerprint FROM subscription_events {} \
             ORDER BY created_at DESC, seq DESC LIMIT $4 OFFSET $5",
            FILTER_CLAUSE
        );

        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(event_type)
            .bind(from)
            .bind(to)
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to list ledger: {}", e)))?;

        rows.into_iter().map(SubscriptionEvent::try_from).collect()
    }

    async fn count(&self, query: &LedgerQuery) -> Result<u64, DomainError> {
        let (event_type, from, to) = bounds(query);
        let sql = format!("SELECT COUNT(*) FROM subscription_events {}", FILTER_CLAUSE);

        let count: i64 = sqlx::query_scalar(&sql)
            .bind(event_type)
            .bind(from)
            .bind(to)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to count ledger: {}", e)))?;

        Ok(count.max(0) as u64)
    }

    async fn all(&self) -> Result<Vec<SubscriptionEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, event_type, from_tier, to_tier, trigger_source, metadata,
                   created_at, fingerprint
            FROM subscription_events
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read ledger: {}", e)))?;

        rows.into_iter().map(SubscriptionEvent::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::metadata_keys;

    #[test]
    fn row_converts_with_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert(metadata_keys::PERIOD.to_string(), "annual".to_string());
        let row = EventRow {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            event_type: "subscription_canceled".to_string(),
            from_tier: "family".to_string(),
            to_tier: "free".to_string(),
            trigger_source: "webhook".to_string(),
            metadata: Json(metadata),
            created_at: Utc::now(),
            fingerprint: "abc".to_string(),
        };

        let event = SubscriptionEvent::try_from(row).unwrap();
        assert_eq!(event.event_type, SubscriptionEventType::SubscriptionCanceled);
        assert_eq!(event.metadata_value(metadata_keys::PERIOD), Some("annual"));
        assert_eq!(event.fingerprint, "abc");
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let row = EventRow {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            event_type: "subscription_paused".to_string(),
            from_tier: "pro".to_string(),
            to_tier: "free".to_string(),
            trigger_source: "webhook".to_string(),
            metadata: Json(BTreeMap::new()),
            created_at: Utc::now(),
            fingerprint: "abc".to_string(),
        };
        assert!(SubscriptionEvent::try_from(row).is_err());
    }
}
