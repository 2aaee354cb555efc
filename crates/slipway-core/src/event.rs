//! Push event parsing for the ingest endpoint.

use serde::Deserialize;

use crate::{Error, Result};

/// Git ref prefix for branches.
pub const HEAD_REF_PREFIX: &str = "refs/heads/";

/// An inbound repository-push notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    pub repository_url: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
}

impl PushEvent {
    /// Validate the payload: both fields must be present and non-empty.
    /// Returns the repository URL and the branch name.
    pub fn into_parts(self) -> Result<(String, String)> {
        let repository_url = self
            .repository_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Validation("repository_url is required".to_string()))?;
        let branch = self
            .git_ref
            .as_deref()
            .and_then(branch_from_ref)
            .ok_or_else(|| Error::Validation("ref is required".to_string()))?
            .to_string();
        Ok((repository_url, branch))
    }
}

/// Extract a branch name from a git ref by stripping the branch prefix.
/// Refs without the prefix pass through unchanged; empty refs yield none.
pub fn branch_from_ref(git_ref: &str) -> Option<&str> {
    let branch = git_ref.strip_prefix(HEAD_REF_PREFIX).unwrap_or(git_ref);
    if branch.is_empty() { None } else { Some(branch) }
}
