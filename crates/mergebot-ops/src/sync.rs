use std::fmt;
use std::str::FromStr;

use mergebot_git::{Depth, ErrorKind, GitError, PushMode, Workspace};
use mergebot_hash::Sha;
use serde::Deserialize;
use tracing::{info, info_span, warn};

use crate::context::ConnectError;
use crate::{GitContext, PreconditionError, PullRequestHandle, SyncConfig, TokenError};

/// Remote holding the head branch.
const HEAD_REMOTE: &str = "origin";
/// Remote holding the base branch.
const BASE_REMOTE: &str = "upstream";

/// How the head branch catches up with its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Merge the base branch into the head branch.
    Merge,
    /// Replay the head branch on top of the base branch.
    Rebase,
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStrategy::Merge => "merge",
            SyncStrategy::Rebase => "rebase",
        })
    }
}

impl FromStr for SyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(SyncStrategy::Merge),
            "rebase" => Ok(SyncStrategy::Rebase),
            other => Err(format!("unknown strategy '{other}' (expected merge or rebase)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The head branch already contained the base branch; nothing was pushed.
    UpToDate { head: Sha },
    /// The head branch was updated to `head`.
    Updated { head: Sha, forced: bool },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Git(#[from] GitError),
}

impl SyncError {
    /// Classification of the underlying git failure, if there was one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            SyncError::Git(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl From<ConnectError> for SyncError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Token(e) => SyncError::Token(e),
            ConnectError::Git(e) => SyncError::Git(e),
        }
    }
}

/// Updates a pull request's head branch from its base branch.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    context: GitContext,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(context: GitContext, config: SyncConfig) -> Self {
        Self { context, config }
    }

    /// Merge or rebase the head branch onto the base branch and push it.
    ///
    /// Nothing is pushed unless every step succeeded, so a failure leaves
    /// the remote head branch as it was. A rebase that rewrote commits is
    /// force-pushed with a lease on the fetched head.
    pub fn synchronize(
        &self,
        pr: &PullRequestHandle,
        strategy: SyncStrategy,
    ) -> Result<SyncOutcome, SyncError> {
        if pr.merged {
            return Err(PreconditionError::AlreadyMerged(pr.number).into());
        }
        let span = info_span!("synchronize", pr = pr.number, %strategy);
        let _guard = span.enter();

        let mut ws = self.context.workspace()?;
        let outcome = self.run(&mut ws, pr, strategy);
        if let Err(err) = ws.release() {
            warn!(error = %err, "failed to release workspace");
        }

        match &outcome {
            Ok(SyncOutcome::UpToDate { .. }) => info!("head branch already up to date"),
            Ok(SyncOutcome::Updated { head, forced }) => {
                info!(head = %head.short(), forced, "head branch updated")
            }
            Err(err) => warn!(error = %err, "synchronization failed"),
        }
        outcome
    }

    fn run(
        &self,
        ws: &mut Workspace,
        pr: &PullRequestHandle,
        strategy: SyncStrategy,
    ) -> Result<SyncOutcome, SyncError> {
        self.context.connect(ws, HEAD_REMOTE, &pr.head_repo)?;
        self.context.connect(ws, BASE_REMOTE, &pr.base_repo)?;

        let head_ref = format!("{HEAD_REMOTE}/{}", pr.head_branch);
        let base_ref = format!("{BASE_REMOTE}/{}", pr.base_branch);
        self.fetch_to_merge_base(ws, pr, &head_ref, &base_ref)?;

        ws.checkout_new_branch(&head_ref, &pr.head_branch)?;
        let before = ws.head()?;
        let after = match strategy {
            SyncStrategy::Merge => {
                let message = format!(
                    "Merge branch '{}' into {}",
                    pr.base_branch, pr.head_branch
                );
                ws.merge(&base_ref, self.config.merge_strategy, Some(&message))?
            }
            SyncStrategy::Rebase => ws.rebase(&base_ref)?,
        };
        if after == before {
            return Ok(SyncOutcome::UpToDate { head: after });
        }

        // A rebase that only fast-forwarded did not rewrite anything.
        let rewritten = strategy == SyncStrategy::Rebase
            && ws.merge_base(&before.to_hex(), &after.to_hex())? != Some(before);
        let mode = if rewritten {
            PushMode::Force
        } else {
            PushMode::FastForward
        };
        let refspec = format!("{0}:refs/heads/{0}", pr.head_branch);
        ws.push(HEAD_REMOTE, &[refspec.as_str()], mode)?;
        Ok(SyncOutcome::Updated {
            head: after,
            forced: rewritten,
        })
    }

    /// Fetch both branches shallowly, doubling the depth until they share
    /// a merge base, and fall back to full history past `max_depth`.
    fn fetch_to_merge_base(
        &self,
        ws: &mut Workspace,
        pr: &PullRequestHandle,
        head_ref: &str,
        base_ref: &str,
    ) -> Result<(), GitError> {
        let head = [pr.head_branch.as_str()];
        let base = [pr.base_branch.as_str()];

        if self.config.initial_depth == 0 {
            ws.fetch(HEAD_REMOTE, &head, Depth::Full)?;
            ws.fetch(BASE_REMOTE, &base, Depth::Full)?;
            return Ok(());
        }

        let mut depth = self.config.initial_depth;
        loop {
            ws.fetch(HEAD_REMOTE, &head, Depth::Shallow(depth))?;
            ws.fetch(BASE_REMOTE, &base, Depth::Shallow(depth))?;
            if ws.merge_base(head_ref, base_ref)?.is_some() {
                return Ok(());
            }
            if depth >= self.config.max_depth {
                info!(depth, "no merge base in shallow history, fetching everything");
                ws.fetch(HEAD_REMOTE, &head, Depth::Unshallow)?;
                ws.fetch(BASE_REMOTE, &base, Depth::Unshallow)?;
                return Ok(());
            }
            depth = depth.saturating_mul(2).min(self.config.max_depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names() {
        assert_eq!("merge".parse::<SyncStrategy>(), Ok(SyncStrategy::Merge));
        assert_eq!("rebase".parse::<SyncStrategy>(), Ok(SyncStrategy::Rebase));
        assert!("squash".parse::<SyncStrategy>().is_err());
        assert_eq!(SyncStrategy::Rebase.to_string(), "rebase");
    }

    #[test]
    fn error_kind_only_for_git_failures() {
        let err = SyncError::from(PreconditionError::AlreadyMerged(1));
        assert_eq!(err.kind(), None);
        let err = SyncError::from(GitError::Cancelled);
        assert_eq!(err.kind(), Some(ErrorKind::Cancelled));
    }
}
