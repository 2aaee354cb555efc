//! Repository traits and implementations.

pub mod account;
pub mod job;
pub mod project;
pub mod runner;

pub use account::{Account, AccountRepo, PgAccountRepo};
pub use job::{Job, JobRepo, PgJobRepo};
pub use project::{NewProject, PgProjectRepo, Project, ProjectPatch, ProjectRepo};
pub use runner::{PgRunnerRepo, Runner, RunnerRepo};
