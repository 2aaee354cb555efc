//! Job status and the transitions the control plane accepts.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status of a deployment job.
///
/// Legal transitions:
/// - `Queued -> Running`, only through a successful claim
/// - `Running -> Completed`
/// - `Running -> Failed`
/// - `Running -> Running`, a status re-assert carrying fresh logs
///
/// Everything else is a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Present in the schema; nothing produces or consumes it.
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal statuses get `completed_at` stamped and accept no further
    /// transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    pub fn can_become(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    /// Statuses a runner may report through the status-update endpoint.
    /// `Queued -> Running` is reserved for the claim path.
    pub fn is_reportable(&self) -> bool {
        matches!(
            self,
            JobStatus::Running | JobStatus::Completed | JobStatus::Failed
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(Error::Validation(format!("unknown job status: {other}"))),
        }
    }
}

/// Join a log chunk onto existing log text.
///
/// Lines are newline-joined; appending to empty logs yields the chunk alone
/// rather than a leading newline.
pub fn append_log_text(current: Option<&str>, chunk: &str) -> String {
    match current {
        None | Some("") => chunk.to_string(),
        Some(existing) => format!("{existing}\n{chunk}"),
    }
}
