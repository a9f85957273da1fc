use std::fmt;

use mergebot_hash::Sha;

use crate::ErrorKind;

/// Which operation stopped on a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOperation {
    CherryPick,
    Rebase,
    Merge,
}

impl fmt::Display for ConflictOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictOperation::CherryPick => "cherry-pick",
            ConflictOperation::Rebase => "rebase",
            ConflictOperation::Merge => "merge",
        })
    }
}

/// A classified failure of a workspace operation.
///
/// Captured git output stored in these errors has already been redacted.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {command} failed after {attempts} attempt(s): {detail}")]
    Transient {
        command: String,
        detail: String,
        attempts: u32,
    },

    #[error("{operation} conflict{}: {detail}", commit_suffix(.commit))]
    Conflict {
        operation: ConflictOperation,
        /// The commit whose changes could not be applied, when git reports it.
        commit: Option<Sha>,
        detail: String,
    },

    #[error("git {command} failed: {detail}")]
    Fatal { command: String, detail: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn commit_suffix(commit: &Option<Sha>) -> String {
    match commit {
        Some(sha) => format!(" on {sha}"),
        None => String::new(),
    }
}

impl GitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GitError::Transient { .. } => ErrorKind::Transient,
            GitError::Conflict { .. } => ErrorKind::Conflict,
            GitError::Fatal { .. } | GitError::Io(_) => ErrorKind::Fatal,
            GitError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The conflicting commit, for conflict errors that identify one.
    pub fn conflicting_commit(&self) -> Option<Sha> {
        match self {
            GitError::Conflict { commit, .. } => *commit,
            _ => None,
        }
    }

    pub(crate) fn with_attempts(self, count: u32) -> Self {
        match self {
            GitError::Transient {
                command, detail, ..
            } => GitError::Transient {
                command,
                detail,
                attempts: count,
            },
            other => other,
        }
    }
}
