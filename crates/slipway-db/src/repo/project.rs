//! Project repository.
//!
//! Projects are an external collaborator of the queue core: the claim
//! protocol only needs their identity, owner, and repository URL. The rest of
//! the record exists for the management surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slipway_core::{AccountId, ProjectId};
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// A deployable project.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: uuid::Uuid,
    pub account_id: uuid::Uuid,
    pub name: String,
    pub repo_url: String,
    pub framework: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a project.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub repo_url: String,
    pub framework: String,
    pub target: String,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub repo_url: Option<String>,
    pub framework: Option<String>,
    pub target: Option<String>,
}

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    async fn create(&self, account_id: AccountId, project: NewProject) -> DbResult<Project>;
    async fn list(&self, account_id: AccountId) -> DbResult<Vec<Project>>;
    /// Scoped lookup: a project owned by another account reads as not-found.
    async fn get(&self, id: ProjectId, account_id: AccountId) -> DbResult<Project>;
    async fn update(
        &self,
        id: ProjectId,
        account_id: AccountId,
        patch: ProjectPatch,
    ) -> DbResult<Project>;
    async fn delete(&self, id: ProjectId, account_id: AccountId) -> DbResult<()>;
    /// Every project whose stored repository URL equals `repo_url` exactly.
    async fn find_by_repo_url(&self, repo_url: &str) -> DbResult<Vec<Project>>;
}

/// PostgreSQL implementation of ProjectRepo.
pub struct PgProjectRepo {
    pool: PgPool,
}

impl PgProjectRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepo for PgProjectRepo {
    async fn create(&self, account_id: AccountId, project: NewProject) -> DbResult<Project> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, account_id, name, repo_url, framework, target, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(ProjectId::new().as_uuid())
        .bind(account_id.as_uuid())
        .bind(&project.name)
        .bind(&project.repo_url)
        .bind(&project.framework)
        .bind(&project.target)
        .fetch_one(&self.pool)
        .await?;
        Ok(project)
    }

    async fn list(&self, account_id: AccountId) -> DbResult<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn get(&self, id: ProjectId, account_id: AccountId) -> DbResult<Project> {
        let project =
            sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND account_id = $2")
                .bind(id.as_uuid())
                .bind(account_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("project {id}")))?;
        Ok(project)
    }

    async fn update(
        &self,
        id: ProjectId,
        account_id: AccountId,
        patch: ProjectPatch,
    ) -> DbResult<Project> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET name = COALESCE($3, name),
                repo_url = COALESCE($4, repo_url),
                framework = COALESCE($5, framework),
                target = COALESCE($6, target),
                updated_at = NOW()
            WHERE id = $1 AND account_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(account_id.as_uuid())
        .bind(patch.name)
        .bind(patch.repo_url)
        .bind(patch.framework)
        .bind(patch.target)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("project {id}")))?;
        Ok(project)
    }

    async fn delete(&self, id: ProjectId, account_id: AccountId) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND account_id = $2")
            .bind(id.as_uuid())
            .bind(account_id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("project {id}")));
        }
        Ok(())
    }

    async fn find_by_repo_url(&self, repo_url: &str) -> DbResult<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE repo_url = $1 ORDER BY created_at",
        )
        .bind(repo_url)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }
}
