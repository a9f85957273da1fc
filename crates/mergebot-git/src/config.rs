use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::RetryPolicy;

/// Author and committer recorded on commits made inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "mergebot[bot]".to_string(),
            email: "mergebot[bot]@users.noreply.github.com".to_string(),
        }
    }
}

/// Settings shared by every workspace an executor creates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// The git binary to run.
    pub git_program: PathBuf,
    /// Parent directory for workspaces; the system temp dir when unset.
    pub temp_root: Option<PathBuf>,
    /// Per-invocation deadline, in seconds.
    pub command_timeout_secs: u64,
    /// Protocol used for credential matching (`https` for hosted forges).
    pub protocol: String,
    pub retry: RetryPolicy,
}

impl ExecutorConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            git_program: PathBuf::from("git"),
            temp_root: None,
            command_timeout_secs: 300,
            protocol: "https".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}
