//! Job store: the queue, the claim protocol, and the state machine boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slipway_core::{AccountId, JobId, JobStatus, ProjectId, RunnerId};
use sqlx::PgPool;

use crate::{DbError, DbResult};

/// A deployment job.
///
/// Invariant: `runner_id` is non-null iff `status` is running, completed, or
/// failed, and once set it never changes for the life of the job.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: uuid::Uuid,
    pub project_id: uuid::Uuid,
    pub runner_id: Option<uuid::Uuid>,
    pub status: String,
    pub branch: String,
    pub commit_hash: Option<String>,
    pub logs: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait JobRepo: Send + Sync {
    /// Create a job in `queued` state with no runner.
    async fn enqueue(&self, project_id: ProjectId, branch: &str) -> DbResult<Job>;

    /// All jobs belonging to the account's projects, newest first.
    async fn list_for_account(&self, account_id: AccountId) -> DbResult<Vec<Job>>;

    /// Scoped lookup through the owning project.
    async fn get_for_account(&self, id: JobId, account_id: AccountId) -> DbResult<Job>;

    async fn get(&self, id: JobId) -> DbResult<Job>;

    /// The single oldest queued, unclaimed job.
    async fn next_available(&self) -> DbResult<Option<Job>>;

    /// Atomically assign a queued, unclaimed job to `runner_id`.
    ///
    /// Must be one conditional write; two runners racing on the same job must
    /// resolve to exactly one winner. The loser gets [`DbError::Conflict`].
    /// A repeat claim by the winner is the same conflict.
    async fn claim(&self, id: JobId, runner_id: RunnerId) -> DbResult<Job>;

    /// Apply a status report from the owning runner. Only a running job
    /// accepts reports; terminal statuses stamp `completed_at`. `logs`
    /// replaces the stored log text when present.
    async fn update_status(
        &self,
        id: JobId,
        runner_id: RunnerId,
        status: JobStatus,
        logs: Option<&str>,
    ) -> DbResult<Job>;

    /// Newline-join a log chunk onto the job owned by `runner_id`.
    async fn append_logs(&self, id: JobId, runner_id: RunnerId, chunk: &str) -> DbResult<Job>;
}

/// PostgreSQL implementation of JobRepo.
pub struct PgJobRepo {
    pool: PgPool,
}

impl PgJobRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Distinguish "gone" from "lost the race" after a conditional write
    /// matched no row. Reads only; the write already settled.
    async fn conflict_or_not_found(&self, id: JobId, runner_id: RunnerId) -> DbError {
        match self.get(id).await {
            Ok(job) if job.runner_id == Some(*runner_id.as_uuid()) => {
                DbError::Conflict(format!("job {id} does not accept this transition"))
            }
            Ok(_) => DbError::NotFound(format!("job {id}")),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobRepo for PgJobRepo {
    async fn enqueue(&self, project_id: ProjectId, branch: &str) -> DbResult<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, project_id, status, branch, created_at, updated_at)
            VALUES ($1, $2, 'queued', $3, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(JobId::new().as_uuid())
        .bind(project_id.as_uuid())
        .bind(branch)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    async fn list_for_account(&self, account_id: AccountId) -> DbResult<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT j.*
            FROM jobs j
            JOIN projects p ON j.project_id = p.id
            WHERE p.account_id = $1
            ORDER BY j.created_at DESC
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn get_for_account(&self, id: JobId, account_id: AccountId) -> DbResult<Job> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT j.*
            FROM jobs j
            JOIN projects p ON j.project_id = p.id
            WHERE j.id = $1 AND p.account_id = $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        Ok(job)
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        Ok(job)
    }

    async fn next_available(&self) -> DbResult<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT * FROM jobs
            WHERE status = 'queued' AND runner_id IS NULL
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn claim(&self, id: JobId, runner_id: RunnerId) -> DbResult<Job> {
        // Single conditional write. The status and runner checks live in the
        // WHERE clause, so two concurrent claims can never both match.
        let claimed = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET runner_id = $2, status = 'running', started_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'queued' AND runner_id IS NULL
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(runner_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match claimed {
            Some(job) => Ok(job),
            None => match self.get(id).await {
                Ok(_) => Err(DbError::Conflict(format!(
                    "job {id} already claimed or not available"
                ))),
                Err(e) => Err(e),
            },
        }
    }

    async fn update_status(
        &self,
        id: JobId,
        runner_id: RunnerId,
        status: JobStatus,
        logs: Option<&str>,
    ) -> DbResult<Job> {
        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET status = $3,
                logs = COALESCE($4, logs),
                completed_at = CASE WHEN $5 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1 AND runner_id = $2 AND status = 'running'
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(runner_id.as_uuid())
        .bind(status.as_str())
        .bind(logs)
        .bind(status.is_terminal())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(job) => Ok(job),
            None => Err(self.conflict_or_not_found(id, runner_id).await),
        }
    }

    async fn append_logs(&self, id: JobId, runner_id: RunnerId, chunk: &str) -> DbResult<Job> {
        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs
            SET logs = CASE
                    WHEN logs IS NULL OR logs = '' THEN $3
                    ELSE logs || E'\n' || $3
                END,
                updated_at = NOW()
            WHERE id = $1 AND runner_id = $2
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(runner_id.as_uuid())
        .bind(chunk)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        Ok(updated)
    }
}
