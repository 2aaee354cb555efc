//! Core domain types for the Slipway deployment control plane.
//!
//! This crate contains:
//! - Resource identifiers
//! - The job state machine
//! - Runner liveness rules
//! - Bearer credential generation and hashing
//! - Push event / git ref parsing

pub mod credential;
pub mod error;
pub mod event;
pub mod id;
pub mod job;
pub mod runner;

pub use error::{Error, Result};
pub use id::{AccountId, JobId, ProjectId, RunnerId};
pub use job::JobStatus;
pub use runner::RunnerStatus;
