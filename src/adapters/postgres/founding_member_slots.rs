//! PostgreSQL founding-member allocator.
//!
//! The single counter row is locked with `SELECT … FOR UPDATE`, so claims
//! from every node are serialized. `founding_member_claims.user_id` is the
//! primary key, which keeps one number per user.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, UserId};
use crate::ports::FoundingMemberSlots;

pub struct PostgresFoundingMemberSlots {
    pool: PgPool,
}

impl PostgresFoundingMemberSlots {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(action: &str) -> impl Fn(sqlx::Error) -> DomainError + '_ {
    move |e| DomainError::database(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl FoundingMemberSlots for PostgresFoundingMemberSlots {
    async fn claim(&self, user_id: &UserId, cap: u32) -> Result<Option<u32>, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin claim"))?;

        let _claimed: i32 =
            sqlx::query_scalar("SELECT claimed FROM founding_member_counter WHERE id = 1 FOR UPDATE")
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error("lock founding counter"))?;

        let existing: Option<i32> =
            sqlx::query_scalar("SELECT number FROM founding_member_claims WHERE user_id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("read founding claim"))?;

        if let Some(number) = existing {
            tx.commit().await.map_err(db_error("commit claim"))?;
            return Ok(Some(number as u32));
        }

        let number: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE founding_member_counter
            SET claimed = claimed + 1
            WHERE id = 1 AND claimed < $1
            RETURNING claimed
            "#,
        )
        .bind(cap as i32)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("increment founding counter"))?;

        let Some(number) = number else {
            tx.rollback().await.map_err(db_error("roll back claim"))?;
            return Ok(None);
        };

        sqlx::query("INSERT INTO founding_member_claims (user_id, number) VALUES ($1, $2)")
            .bind(user_id.as_str())
            .bind(number)
            .execute(&mut *tx)
            .await
            .map_err(db_error("record founding claim"))?;

        tx.commit().await.map_err(db_error("commit claim"))?;
        Ok(Some(number as u32))
    }

    async fn claimed_count(&self) -> Result<u32, DomainError> {
        let claimed: i32 =
            sqlx::query_scalar("SELECT claimed FROM founding_member_counter WHERE id = 1")
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("read founding counter"))?;
        Ok(claimed.max(0) as u32)
    }
}
