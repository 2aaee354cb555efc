//! Account repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slipway_core::AccountId;
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// An account: the owner of projects and runners.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: uuid::Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        token_hash: &str,
    ) -> DbResult<Account>;
    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>>;
    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Account>>;
    /// Set or clear the API token hash. `None` revokes the token.
    async fn set_token_hash(&self, id: AccountId, token_hash: Option<&str>) -> DbResult<()>;
}

/// PostgreSQL implementation of AccountRepo.
pub struct PgAccountRepo {
    pool: PgPool,
}

impl PgAccountRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepo for PgAccountRepo {
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        token_hash: &str,
    ) -> DbResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, name, email, password_hash, token_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(AccountId::new().as_uuid())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::Duplicate(format!("account with email {email}"))
            }
            _ => DbError::Database(e),
        })?;
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn set_token_hash(&self, id: AccountId, token_hash: Option<&str>) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE accounts SET token_hash = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_uuid())
                .bind(token_hash)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("account {id}")));
        }
        Ok(())
    }
}
