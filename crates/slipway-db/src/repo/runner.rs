//! Runner registry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slipway_core::{AccountId, RunnerId, RunnerStatus};
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// A registered runner.
///
/// The bearer token itself is never stored; `token_hash` is its SHA-256
/// digest, written once at registration and excluded from every response.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Runner {
    pub id: uuid::Uuid,
    pub account_id: uuid::Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub status: String,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Runner {
    /// Liveness as observed against a heartbeat threshold. The stored status
    /// never flips to offline on its own; this derives it.
    pub fn observed_status(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> RunnerStatus {
        RunnerStatus::observe(self.last_seen_at, now, threshold)
    }
}

#[async_trait]
pub trait RunnerRepo: Send + Sync {
    async fn create(&self, account_id: AccountId, name: &str, token_hash: &str)
    -> DbResult<Runner>;
    async fn list(&self, account_id: AccountId) -> DbResult<Vec<Runner>>;
    async fn delete(&self, id: RunnerId, account_id: AccountId) -> DbResult<()>;
    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Runner>>;
    /// Record a liveness signal: status online, last_seen_at now.
    async fn heartbeat(&self, id: RunnerId) -> DbResult<Runner>;
}

/// PostgreSQL implementation of RunnerRepo.
pub struct PgRunnerRepo {
    pool: PgPool,
}

impl PgRunnerRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunnerRepo for PgRunnerRepo {
    async fn create(
        &self,
        account_id: AccountId,
        name: &str,
        token_hash: &str,
    ) -> DbResult<Runner> {
        let runner = sqlx::query_as::<_, Runner>(
            r#"
            INSERT INTO runners (id, account_id, name, token_hash, status, last_seen_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'online', NOW(), NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(RunnerId::new().as_uuid())
        .bind(account_id.as_uuid())
        .bind(name)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(runner)
    }

    async fn list(&self, account_id: AccountId) -> DbResult<Vec<Runner>> {
        let runners = sqlx::query_as::<_, Runner>(
            "SELECT * FROM runners WHERE account_id = $1 ORDER BY created_at",
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(runners)
    }

    async fn delete(&self, id: RunnerId, account_id: AccountId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM runners WHERE id = $1 AND account_id = $2")
            .bind(id.as_uuid())
            .bind(account_id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("runner {id}")));
        }
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Runner>> {
        let runner = sqlx::query_as::<_, Runner>("SELECT * FROM runners WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(runner)
    }

    async fn heartbeat(&self, id: RunnerId) -> DbResult<Runner> {
        let runner = sqlx::query_as::<_, Runner>(
            r#"
            UPDATE runners
            SET status = 'online', last_seen_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("runner {id}")))?;
        Ok(runner)
    }
}
