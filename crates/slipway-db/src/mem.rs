//! In-memory store implementing the repository traits.
//!
//! Backs the api integration tests and local development without PostgreSQL.
//! Every mutation happens under one mutex guard, so the claim check-and-set
//! is atomic the same way the SQL conditional write is.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use slipway_core::{AccountId, JobId, JobStatus, ProjectId, RunnerId};
use uuid::Uuid;

use crate::repo::{
    Account, AccountRepo, Job, JobRepo, NewProject, Project, ProjectPatch, ProjectRepo, Runner,
    RunnerRepo,
};
use crate::{DbError, DbResult};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    projects: HashMap<Uuid, Project>,
    runners: HashMap<Uuid, Runner>,
    jobs: HashMap<Uuid, Job>,
}

/// In-memory implementation of every repository trait.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepo for MemStore {
    async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        token_hash: &str,
    ) -> DbResult<Account> {
        let mut inner = self.inner.lock().unwrap();
        if inner.accounts.values().any(|a| a.email == email) {
            return Err(DbError::Duplicate(format!("account with email {email}")));
        }
        let now = Utc::now();
        let account = Account {
            id: *AccountId::new().as_uuid(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            token_hash: Some(token_hash.to_string()),
            created_at: now,
            updated_at: now,
        };
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> DbResult<Option<Account>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Account>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .accounts
            .values()
            .find(|a| a.token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn set_token_hash(&self, id: AccountId, token_hash: Option<&str>) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let account = inner
            .accounts
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("account {id}")))?;
        account.token_hash = token_hash.map(str::to_string);
        account.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ProjectRepo for MemStore {
    async fn create(&self, account_id: AccountId, project: NewProject) -> DbResult<Project> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let project = Project {
            id: *ProjectId::new().as_uuid(),
            account_id: *account_id.as_uuid(),
            name: project.name,
            repo_url: project.repo_url,
            framework: project.framework,
            target: project.target,
            created_at: now,
            updated_at: now,
        };
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn list(&self, account_id: AccountId) -> DbResult<Vec<Project>> {
        let inner = self.inner.lock().unwrap();
        let mut projects: Vec<Project> = inner
            .projects
            .values()
            .filter(|p| p.account_id == *account_id.as_uuid())
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn get(&self, id: ProjectId, account_id: AccountId) -> DbResult<Project> {
        let inner = self.inner.lock().unwrap();
        inner
            .projects
            .get(id.as_uuid())
            .filter(|p| p.account_id == *account_id.as_uuid())
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("project {id}")))
    }

    async fn update(
        &self,
        id: ProjectId,
        account_id: AccountId,
        patch: ProjectPatch,
    ) -> DbResult<Project> {
        let mut inner = self.inner.lock().unwrap();
        let project = inner
            .projects
            .get_mut(id.as_uuid())
            .filter(|p| p.account_id == *account_id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("project {id}")))?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(repo_url) = patch.repo_url {
            project.repo_url = repo_url;
        }
        if let Some(framework) = patch.framework {
            project.framework = framework;
        }
        if let Some(target) = patch.target {
            project.target = target;
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete(&self, id: ProjectId, account_id: AccountId) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let owned = inner
            .projects
            .get(id.as_uuid())
            .is_some_and(|p| p.account_id == *account_id.as_uuid());
        if !owned {
            return Err(DbError::NotFound(format!("project {id}")));
        }
        inner.projects.remove(id.as_uuid());
        // Cascade, matching the FK behavior.
        inner.jobs.retain(|_, j| j.project_id != *id.as_uuid());
        Ok(())
    }

    async fn find_by_repo_url(&self, repo_url: &str) -> DbResult<Vec<Project>> {
        let inner = self.inner.lock().unwrap();
        let mut projects: Vec<Project> = inner
            .projects
            .values()
            .filter(|p| p.repo_url == repo_url)
            .cloned()
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(projects)
    }
}

#[async_trait]
impl RunnerRepo for MemStore {
    async fn create(
        &self,
        account_id: AccountId,
        name: &str,
        token_hash: &str,
    ) -> DbResult<Runner> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let runner = Runner {
            id: *RunnerId::new().as_uuid(),
            account_id: *account_id.as_uuid(),
            name: name.to_string(),
            token_hash: token_hash.to_string(),
            status: "online".to_string(),
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        };
        inner.runners.insert(runner.id, runner.clone());
        Ok(runner)
    }

    async fn list(&self, account_id: AccountId) -> DbResult<Vec<Runner>> {
        let inner = self.inner.lock().unwrap();
        let mut runners: Vec<Runner> = inner
            .runners
            .values()
            .filter(|r| r.account_id == *account_id.as_uuid())
            .cloned()
            .collect();
        runners.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(runners)
    }

    async fn delete(&self, id: RunnerId, account_id: AccountId) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let owned = inner
            .runners
            .get(id.as_uuid())
            .is_some_and(|r| r.account_id == *account_id.as_uuid());
        if !owned {
            return Err(DbError::NotFound(format!("runner {id}")));
        }
        inner.runners.remove(id.as_uuid());
        // SET NULL, matching the FK behavior.
        for job in inner.jobs.values_mut() {
            if job.runner_id == Some(*id.as_uuid()) {
                job.runner_id = None;
            }
        }
        Ok(())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Runner>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .runners
            .values()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn heartbeat(&self, id: RunnerId) -> DbResult<Runner> {
        let mut inner = self.inner.lock().unwrap();
        let runner = inner
            .runners
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("runner {id}")))?;
        runner.status = "online".to_string();
        runner.last_seen_at = Utc::now();
        runner.updated_at = runner.last_seen_at;
        Ok(runner.clone())
    }
}

#[async_trait]
impl JobRepo for MemStore {
    async fn enqueue(&self, project_id: ProjectId, branch: &str) -> DbResult<Job> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let job = Job {
            id: *JobId::new().as_uuid(),
            project_id: *project_id.as_uuid(),
            runner_id: None,
            status: JobStatus::Queued.to_string(),
            branch: branch.to_string(),
            commit_hash: None,
            logs: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn list_for_account(&self, account_id: AccountId) -> DbResult<Vec<Job>> {
        let inner = self.inner.lock().unwrap();
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| {
                inner
                    .projects
                    .get(&j.project_id)
                    .is_some_and(|p| p.account_id == *account_id.as_uuid())
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }

    async fn get_for_account(&self, id: JobId, account_id: AccountId) -> DbResult<Job> {
        let inner = self.inner.lock().unwrap();
        inner
            .jobs
            .get(id.as_uuid())
            .filter(|j| {
                inner
                    .projects
                    .get(&j.project_id)
                    .is_some_and(|p| p.account_id == *account_id.as_uuid())
            })
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))
    }

    async fn get(&self, id: JobId) -> DbResult<Job> {
        let inner = self.inner.lock().unwrap();
        inner
            .jobs
            .get(id.as_uuid())
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))
    }

    async fn next_available(&self) -> DbResult<Option<Job>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued.as_str() && j.runner_id.is_none())
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn claim(&self, id: JobId, runner_id: RunnerId) -> DbResult<Job> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        // Check-and-set under the same guard: the atomicity the SQL
        // conditional write provides.
        if job.status != JobStatus::Queued.as_str() || job.runner_id.is_some() {
            return Err(DbError::Conflict(format!(
                "job {id} already claimed or not available"
            )));
        }
        let now = Utc::now();
        job.runner_id = Some(*runner_id.as_uuid());
        job.status = JobStatus::Running.to_string();
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn update_status(
        &self,
        id: JobId,
        runner_id: RunnerId,
        status: JobStatus,
        logs: Option<&str>,
    ) -> DbResult<Job> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        if job.runner_id != Some(*runner_id.as_uuid()) {
            return Err(DbError::NotFound(format!("job {id}")));
        }
        if job.status != JobStatus::Running.as_str() {
            return Err(DbError::Conflict(format!(
                "job {id} does not accept this transition"
            )));
        }
        let now = Utc::now();
        job.status = status.to_string();
        if let Some(logs) = logs {
            job.logs = Some(logs.to_string());
        }
        if status.is_terminal() {
            job.completed_at = Some(now);
        }
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn append_logs(&self, id: JobId, runner_id: RunnerId, chunk: &str) -> DbResult<Job> {
        let mut inner = self.inner.lock().unwrap();
        let job = inner
            .jobs
            .get_mut(id.as_uuid())
            .ok_or_else(|| DbError::NotFound(format!("job {id}")))?;
        if job.runner_id != Some(*runner_id.as_uuid()) {
            return Err(DbError::NotFound(format!("job {id}")));
        }
        job.logs = Some(slipway_core::job::append_log_text(
            job.logs.as_deref(),
            chunk,
        ));
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}
