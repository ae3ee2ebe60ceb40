//! PostgreSQL implementation of the account subscription ports.
//!
//! `update` is an optimistic compare-and-set on `version`; a stale write is
//! reported as `ConcurrentModification`. `update_with_entry` runs the ledger
//! insert and the compare-and-set in one transaction and rolls both back when
//! the row does not match.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use super::ledger::insert_entry;
use crate::domain::billing::{
    AccountSubscription, BillingPeriod, SubscriptionAccess, SubscriptionEvent, SubscriptionStatus,
    SubscriptionTier,
};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{AppendOutcome, InsertResult, SubscriptionReader, SubscriptionRepository};

const SELECT_COLUMNS: &str = r#"
    SELECT user_id, tier, period, status, external_customer_ref, external_subscription_ref,
           is_founding_member, founding_member_number, started_at, ends_at,
           created_at, updated_at, version
    FROM account_subscriptions
"#;

pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Explains why a compare-and-set matched no row.
    async fn rejected_update(&self, account: &AccountSubscription) -> DomainError {
        match self.find_by_user(&account.user_id).await {
            Ok(Some(_)) => DomainError::new(
                ErrorCode::ConcurrentModification,
                "Subscription was modified concurrently",
            )
            .with_detail("user_id", account.user_id.as_str()),
            Ok(None) => DomainError::new(ErrorCode::SubscriptionNotFound, "Subscription not found"),
            Err(e) => e,
        }
    }

    async fn fetch_one_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<AccountSubscription>, DomainError> {
        let sql = format!("{} WHERE {} = $1", SELECT_COLUMNS, clause);
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to load subscription: {}", e)))?;

        row.map(AccountSubscription::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    user_id: String,
    tier: String,
    period: String,
    status: String,
    external_customer_ref: Option<String>,
    external_subscription_ref: Option<String>,
    is_founding_member: bool,
    founding_member_number: Option<i32>,
    started_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<AccountRow> for AccountSubscription {
    type Error = DomainError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let tier = SubscriptionTier::parse(&row.tier)
            .ok_or_else(|| DomainError::database(format!("Invalid tier value: {}", row.tier)))?;
        let period = BillingPeriod::parse(&row.period)
            .ok_or_else(|| DomainError::database(format!("Invalid period value: {}", row.period)))?;
        let status = SubscriptionStatus::parse(&row.status)
            .ok_or_else(|| DomainError::database(format!("Invalid status value: {}", row.status)))?;

        Ok(AccountSubscription {
            user_id: UserId::new(row.user_id)
                .map_err(|e| DomainError::database(format!("Invalid user_id: {}", e)))?,
            tier,
            period,
            status,
            external_customer_ref: row.external_customer_ref,
            external_subscription_ref: row.external_subscription_ref,
            is_founding_member: row.is_founding_member,
            founding_member_number: row.founding_member_number.map(|n| n as u32),
            started_at: row.started_at.map(Timestamp::from_datetime),
            ends_at: row.ends_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version as u64,
        })
    }
}

/// Version compare-and-set; `None` when no row matched.
async fn update_row<'e, E>(
    executor: E,
    account: &AccountSubscription,
) -> Result<Option<u64>, DomainError>
where
    E: PgExecutor<'e>,
{
    let new_version: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE account_subscriptions SET
            tier = $3,
            period = $4,
            status = $5,
            external_customer_ref = $6,
            external_subscription_ref = $7,
            is_founding_member = $8,
            founding_member_number = $9,
            started_at = $10,
            ends_at = $11,
            updated_at = $12,
            version = version + 1
        WHERE user_id = $1 AND version = $2
        RETURNING version
        "#,
    )
    .bind(account.user_id.as_str())
    .bind(account.version as i64)
    .bind(account.tier.as_str())
    .bind(account.period.as_str())
    .bind(account.status.as_str())
    .bind(&account.external_customer_ref)
    .bind(&account.external_subscription_ref)
    .bind(account.is_founding_member)
    .bind(account.founding_member_number.map(|n| n as i32))
    .bind(account.started_at.map(|t| *t.as_datetime()))
    .bind(account.ends_at.map(|t| *t.as_datetime()))
    .bind(account.updated_at.as_datetime())
    .fetch_optional(executor)
    .await
    .map_err(|e| DomainError::database(format!("Failed to update subscription: {}", e)))?;

    Ok(new_version.map(|v| v as u64))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<AccountSubscription>, DomainError> {
        self.fetch_one_where("user_id", user_id.as_str()).await
    }

    async fn find_by_customer_ref(
        &self,
        customer_ref: &str,
    ) -> Result<Option<AccountSubscription>, DomainError> {
        self.fetch_one_where("external_customer_ref", customer_ref).await
    }

    async fn find_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<AccountSubscription>, DomainError> {
        self.fetch_one_where("external_subscription_ref", subscription_ref)
            .await
    }

    async fn insert(&self, account: &AccountSubscription) -> Result<InsertResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO account_subscriptions (
                user_id, tier, period, status, external_customer_ref, external_subscription_ref,
                is_founding_member, founding_member_number, started_at, ends_at,
                created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(account.user_id.as_str())
        .bind(account.tier.as_str())
        .bind(account.period.as_str())
        .bind(account.status.as_str())
        .bind(&account.external_customer_ref)
        .bind(&account.external_subscription_ref)
        .bind(account.is_founding_member)
        .bind(account.founding_member_number.map(|n| n as i32))
        .bind(account.started_at.map(|t| *t.as_datetime()))
        .bind(account.ends_at.map(|t| *t.as_datetime()))
        .bind(account.created_at.as_datetime())
        .bind(account.updated_at.as_datetime())
        .bind(account.version as i64)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertResult::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertResult::AlreadyExists),
            Err(e) => Err(DomainError::database(format!(
                "Failed to insert subscription: {}",
                e
            ))),
        }
    }

    async fn update(&self, account: &AccountSubscription) -> Result<u64, DomainError> {
        match update_row(&self.pool, account).await? {
            Some(version) => Ok(version),
            None => Err(self.rejected_update(account).await),
        }
    }

    async fn update_with_entry(
        &self,
        account: &AccountSubscription,
        entry: &SubscriptionEvent,
    ) -> Result<(u64, AppendOutcome), DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::database(format!("Failed to start transaction: {}", e))
        })?;

        let appended = insert_entry(&mut *tx, entry).await?;
        let Some(version) = update_row(&mut *tx, account).await? else {
            tx.rollback().await.map_err(|e| {
                DomainError::database(format!("Failed to roll back transaction: {}", e))
            })?;
            return Err(self.rejected_update(account).await);
        };

        tx.commit().await.map_err(|e| {
            DomainError::database(format!("Failed to commit transaction: {}", e))
        })?;

        Ok((version, appended))
    }

    async fn list_all(&self) -> Result<Vec<AccountSubscription>, DomainError> {
        let sql = format!("{} ORDER BY user_id", SELECT_COLUMNS);
        let rows: Vec<AccountRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to list subscriptions: {}", e)))?;

        rows.into_iter().map(AccountSubscription::try_from).collect()
    }
}

#[async_trait]
impl SubscriptionReader for PostgresSubscriptionRepository {
    async fn access(&self, user_id: &UserId) -> Result<SubscriptionAccess, DomainError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT tier, status FROM account_subscriptions WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to read access: {}", e)))?;

        let Some((tier, status)) = row else {
            return Ok(SubscriptionAccess::free());
        };

        Ok(SubscriptionAccess {
            tier: SubscriptionTier::parse(&tier)
                .ok_or_else(|| DomainError::database(format!("Invalid tier value: {}", tier)))?,
            status: SubscriptionStatus::parse(&status)
                .ok_or_else(|| DomainError::database(format!("Invalid status value: {}", status)))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AccountRow {
        let now = Utc::now();
        AccountRow {
            user_id: "user-1".to_string(),
            tier: "family".to_string(),
            period: "annual".to_string(),
            status: "active".to_string(),
            external_customer_ref: Some("cus_1".to_string()),
            external_subscription_ref: Some("sub_1".to_string()),
            is_founding_member: true,
            founding_member_number: Some(3),
            started_at: Some(now),
            ends_at: None,
            created_at: now,
            updated_at: now,
            version: 4,
        }
    }

    #[test]
    fn row_converts_to_account() {
        let account = AccountSubscription::try_from(row()).unwrap();
        assert_eq!(account.tier, SubscriptionTier::Family);
        assert_eq!(account.period, BillingPeriod::Annual);
        assert_eq!(account.founding_member_number, Some(3));
        assert_eq!(account.version, 4);
    }

    #[test]
    fn unknown_tier_is_database_error() {
        let mut bad = row();
        bad.tier = "platinum".to_string();
        let err = AccountSubscription::try_from(bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
