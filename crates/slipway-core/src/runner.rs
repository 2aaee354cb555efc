//! Runner status and liveness.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Observed status of a runner.
///
/// The store only ever writes `online` (registration and heartbeat both set
/// it); there is no automated offline transition. `Offline` exists as a
/// derived view computed from `last_seen_at`, so a reclaim/lease mechanism
/// can be layered on later without touching the claim contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerStatus {
    Online,
    Offline,
}

impl RunnerStatus {
    /// Liveness predicate: a runner is offline once its last heartbeat is
    /// older than `threshold`.
    pub fn observe(last_seen_at: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> Self {
        if now - last_seen_at > threshold {
            RunnerStatus::Offline
        } else {
            RunnerStatus::Online
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerStatus::Online => "online",
            RunnerStatus::Offline => "offline",
        }
    }
}

impl std::fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_heartbeat_is_online() {
        let now = Utc::now();
        let status = RunnerStatus::observe(now - Duration::seconds(10), now, Duration::seconds(60));
        assert_eq!(status, RunnerStatus::Online);
    }

    #[test]
    fn stale_heartbeat_is_offline() {
        let now = Utc::now();
        let status = RunnerStatus::observe(now - Duration::seconds(90), now, Duration::seconds(60));
        assert_eq!(status, RunnerStatus::Offline);
    }

    #[test]
    fn threshold_is_exclusive() {
        let now = Utc::now();
        let status = RunnerStatus::observe(now - Duration::seconds(60), now, Duration::seconds(60));
        assert_eq!(status, RunnerStatus::Online);
    }
}
