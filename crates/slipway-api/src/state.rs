//! Application state.

use std::sync::Arc;

use slipway_db::mem::MemStore;
use slipway_db::{
    AccountRepo, JobRepo, PgAccountRepo, PgJobRepo, PgProjectRepo, PgRunnerRepo, ProjectRepo,
    RunnerRepo,
};
use sqlx::PgPool;

use crate::AppConfig;

/// Shared application state. Repositories are trait objects so the server
/// and the tests can run against PostgreSQL or the in-memory store.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepo>,
    pub projects: Arc<dyn ProjectRepo>,
    pub runners: Arc<dyn RunnerRepo>,
    pub jobs: Arc<dyn JobRepo>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            accounts: Arc::new(PgAccountRepo::new(pool.clone())),
            projects: Arc::new(PgProjectRepo::new(pool.clone())),
            runners: Arc::new(PgRunnerRepo::new(pool.clone())),
            jobs: Arc::new(PgJobRepo::new(pool)),
            config: Arc::new(config),
        }
    }

    /// State backed by the in-memory store.
    pub fn in_memory(config: AppConfig) -> Self {
        let store = Arc::new(MemStore::new());
        Self {
            accounts: store.clone(),
            projects: store.clone(),
            runners: store.clone(),
            jobs: store,
            config: Arc::new(config),
        }
    }
}
