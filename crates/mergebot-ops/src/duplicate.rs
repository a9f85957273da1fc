use mergebot_git::{Depth, ErrorKind, GitError, PushMode, Workspace};
use mergebot_graph::{resolve, CommitGraph, ResolutionError, Topology};
use mergebot_hash::Sha;
use rayon::prelude::*;
use tracing::{debug, info, info_span, warn, Span};

use crate::context::ConnectError;
use crate::{
    DuplicateConfig, GitContext, HostError, NewPullRequest, PreconditionError, PullRequestHandle,
    PullRequestHost, TokenError,
};

/// Remote holding the base repository inside each workspace.
const REMOTE: &str = "origin";

/// Why one target branch did not receive a copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DuplicateFailure {
    #[error("cannot determine the commits to copy: {0}")]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("{detail}")]
    Git {
        kind: ErrorKind,
        commit: Option<Sha>,
        detail: String,
    },
}

impl DuplicateFailure {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DuplicateFailure::Git { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The commit that failed to apply, for conflicts.
    pub fn conflicting_commit(&self) -> Option<Sha> {
        match self {
            DuplicateFailure::Git { commit, .. } => *commit,
            _ => None,
        }
    }
}

impl From<GitError> for DuplicateFailure {
    fn from(err: GitError) -> Self {
        DuplicateFailure::Git {
            kind: err.kind(),
            commit: err.conflicting_commit(),
            detail: err.to_string(),
        }
    }
}

impl From<ConnectError> for DuplicateFailure {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Token(e) => e.into(),
            ConnectError::Git(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Created { branch: String },
    Failed { reason: DuplicateFailure },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: String,
    pub outcome: TargetOutcome,
}

/// Per-target outcomes, in the order the targets were given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateReport {
    pub pull_request: u64,
    pub targets: Vec<TargetReport>,
}

impl DuplicateReport {
    /// `(target, branch)` for every branch that was pushed.
    pub fn created(&self) -> impl Iterator<Item = (&str, &str)> {
        self.targets.iter().filter_map(|r| match &r.outcome {
            TargetOutcome::Created { branch } => Some((r.target.as_str(), branch.as_str())),
            TargetOutcome::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &DuplicateFailure)> {
        self.targets.iter().filter_map(|r| match &r.outcome {
            TargetOutcome::Failed { reason } => Some((r.target.as_str(), reason)),
            TargetOutcome::Created { .. } => None,
        })
    }

    pub fn outcome(&self, target: &str) -> Option<&TargetOutcome> {
        self.targets
            .iter()
            .find(|r| r.target == target)
            .map(|r| &r.outcome)
    }

    pub fn all_created(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Result of opening the follow-up pull request for one pushed branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestResult {
    pub target: String,
    pub branch: String,
    pub result: Result<u64, HostError>,
}

/// Copies a merged pull request onto other branches.
#[derive(Debug, Clone)]
pub struct Duplicator {
    context: GitContext,
    config: DuplicateConfig,
}

impl Duplicator {
    pub fn new(context: GitContext, config: DuplicateConfig) -> Self {
        Self { context, config }
    }

    /// Name of the branch holding the copy of pull request `number` for `target`.
    pub fn branch_name(&self, target: &str, number: u64) -> String {
        let prefix = self.config.branch_prefix.trim_end_matches('/');
        format!("{prefix}/{target}/pr-{number}")
    }

    /// Cherry-pick the pull request's changes onto each of `targets` and
    /// push one new branch per target.
    ///
    /// The commits to copy are resolved once. Each target then gets its own
    /// workspace, and a failure on one target does not affect the others.
    pub fn duplicate(
        &self,
        pr: &PullRequestHandle,
        targets: &[String],
    ) -> Result<DuplicateReport, PreconditionError> {
        if !pr.merged {
            return Err(PreconditionError::NotMerged(pr.number));
        }
        let result = pr
            .result
            .ok_or(PreconditionError::MissingResult(pr.number))?;

        let span = info_span!("duplicate", pr = pr.number, targets = targets.len());
        let replay = span.in_scope(|| self.replay_set(pr, &result));
        match &replay {
            Ok(commits) => span.in_scope(|| info!(commits = commits.len(), "commits to copy")),
            Err(err) => span.in_scope(|| warn!(error = %err, "cannot resolve commits to copy")),
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_parallel.max(1))
            .build();
        let reports: Vec<TargetReport> = match pool {
            Ok(pool) => pool.install(|| {
                targets
                    .par_iter()
                    .map(|target| self.run_target(pr, target, &replay, &span))
                    .collect()
            }),
            Err(err) => {
                warn!(error = %err, "cannot start worker pool, copying one target at a time");
                targets
                    .iter()
                    .map(|target| self.run_target(pr, target, &replay, &span))
                    .collect()
            }
        };

        Ok(DuplicateReport {
            pull_request: pr.number,
            targets: reports,
        })
    }

    /// Open one pull request per created branch. Host failures are
    /// reported per branch.
    pub fn open_pull_requests(
        &self,
        pr: &PullRequestHandle,
        report: &DuplicateReport,
        host: &dyn PullRequestHost,
    ) -> Vec<PullRequestResult> {
        report
            .created()
            .map(|(target, branch)| {
                let request = self.pull_request_for(pr, target, branch);
                let result = host.open_pull_request(&request);
                match &result {
                    Ok(number) => info!(target_branch = target, number, "pull request opened"),
                    Err(err) => warn!(target_branch = target, error = %err, "cannot open pull request"),
                }
                PullRequestResult {
                    target: target.to_string(),
                    branch: branch.to_string(),
                    result,
                }
            })
            .collect()
    }

    pub fn pull_request_for(
        &self,
        pr: &PullRequestHandle,
        target: &str,
        branch: &str,
    ) -> NewPullRequest {
        let label = &self.config.label;
        NewPullRequest {
            repo: pr.base_repo.clone(),
            base: target.to_string(),
            head: branch.to_string(),
            title: format!("Automatic {label} of pull request #{}", pr.number),
            body: format!("This is an automated {label} of pull request #{}.", pr.number),
        }
    }

    fn run_target(
        &self,
        pr: &PullRequestHandle,
        target: &str,
        replay: &Result<Vec<Sha>, DuplicateFailure>,
        parent: &Span,
    ) -> TargetReport {
        let span = info_span!(parent: parent, "target", target_branch = target);
        let _guard = span.enter();

        let outcome = match replay {
            Ok(commits) => match self.copy_to(pr, target, commits) {
                Ok(branch) => TargetOutcome::Created { branch },
                Err(reason) => {
                    warn!(error = %reason, "copy failed");
                    TargetOutcome::Failed { reason }
                }
            },
            Err(reason) => TargetOutcome::Failed {
                reason: reason.clone(),
            },
        };
        TargetReport {
            target: target.to_string(),
            outcome,
        }
    }

    /// The commits to cherry-pick, oldest first.
    ///
    /// Uses the graph carried by the handle when it knows the result
    /// commit, and otherwise reads the first-parent history of the result
    /// from the base repository.
    fn replay_set(&self, pr: &PullRequestHandle, result: &Sha) -> Result<Vec<Sha>, DuplicateFailure> {
        if pr.graph.contains(result) {
            debug!("resolving against supplied graph");
            return Ok(resolve(&pr.graph, &pr.commits, result)?);
        }

        let mut ws = self.context.workspace()?;
        let graph = self.read_history(&mut ws, pr, result);
        if let Err(err) = ws.release() {
            warn!(error = %err, "failed to release workspace");
        }
        let graph = graph?;
        if let Ok(topology) = Topology::classify(&graph, result) {
            debug!(%topology, "merge shape");
        }
        Ok(resolve(&graph, &pr.commits, result)?)
    }

    fn read_history(
        &self,
        ws: &mut Workspace,
        pr: &PullRequestHandle,
        result: &Sha,
    ) -> Result<CommitGraph, DuplicateFailure> {
        self.context.connect(ws, REMOTE, &pr.base_repo)?;
        ws.fetch(REMOTE, &[pr.base_branch.as_str()], Depth::Full)?;
        Ok(ws.log_graph(&result.to_hex(), pr.commits.len() + 1)?)
    }

    fn copy_to(
        &self,
        pr: &PullRequestHandle,
        target: &str,
        commits: &[Sha],
    ) -> Result<String, DuplicateFailure> {
        let branch = self.branch_name(target, pr.number);
        let mut ws = self.context.workspace()?;
        let outcome = self.apply(&mut ws, pr, target, &branch, commits);
        if let Err(err) = ws.release() {
            warn!(error = %err, "failed to release workspace");
        }
        outcome.map(|()| branch)
    }

    fn apply(
        &self,
        ws: &mut Workspace,
        pr: &PullRequestHandle,
        target: &str,
        branch: &str,
        commits: &[Sha],
    ) -> Result<(), DuplicateFailure> {
        self.context.connect(ws, REMOTE, &pr.base_repo)?;

        // The commits to copy are reachable from the base branch.
        let mut branches = vec![target];
        if pr.base_branch != target {
            branches.push(pr.base_branch.as_str());
        }
        ws.fetch(REMOTE, &branches, Depth::Full)?;

        ws.checkout_new_branch(&format!("{REMOTE}/{target}"), branch)?;
        let head = ws.cherry_pick(commits)?;
        let refspec = format!("{branch}:refs/heads/{branch}");
        ws.push(REMOTE, &[refspec.as_str()], PushMode::FastForward)?;
        info!(branch, head = %head.short(), "branch pushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mergebot_git::{ExecutorConfig, Identity};

    use super::*;
    use crate::{RepoRef, StaticTokens};

    fn duplicator(config: DuplicateConfig) -> Duplicator {
        let context = GitContext::new(
            ExecutorConfig::default(),
            Identity::default(),
            Arc::new(StaticTokens::new()),
        );
        Duplicator::new(context, config)
    }

    fn handle() -> PullRequestHandle {
        let repo = RepoRef::new("org/app", "https://github.com/org/app.git");
        PullRequestHandle {
            number: 12,
            head_repo: repo.clone(),
            head_branch: "fix".into(),
            base_repo: repo,
            base_branch: "main".into(),
            merged: false,
            commits: Default::default(),
            result: None,
            graph: Default::default(),
        }
    }

    #[test]
    fn branch_names() {
        let dup = duplicator(DuplicateConfig::default());
        assert_eq!(dup.branch_name("stable/1.0", 12), "mergebot/bp/stable/1.0/pr-12");
        let dup = duplicator(DuplicateConfig {
            branch_prefix: "copies/".into(),
            ..DuplicateConfig::default()
        });
        assert_eq!(dup.branch_name("v2", 3), "copies/v2/pr-3");
    }

    #[test]
    fn pull_request_text() {
        let dup = duplicator(DuplicateConfig::default());
        let request = dup.pull_request_for(&handle(), "stable", "mergebot/bp/stable/pr-12");
        assert_eq!(request.title, "Automatic backport of pull request #12");
        assert_eq!(request.body, "This is an automated backport of pull request #12.");
        assert_eq!(request.base, "stable");
        assert_eq!(request.repo.full_name, "org/app");
    }

    #[test]
    fn unmerged_pull_request_is_rejected() {
        let dup = duplicator(DuplicateConfig::default());
        let err = dup.duplicate(&handle(), &["stable".into()]).unwrap_err();
        assert_eq!(err, PreconditionError::NotMerged(12));
    }

    #[test]
    fn merged_without_result_is_rejected() {
        let dup = duplicator(DuplicateConfig::default());
        let mut pr = handle();
        pr.merged = true;
        let err = dup.duplicate(&pr, &["stable".into()]).unwrap_err();
        assert_eq!(err, PreconditionError::MissingResult(12));
    }

    #[test]
    fn git_failure_keeps_kind_and_commit() {
        let sha: Sha = "0123456789abcdef0123456789abcdef01234567".parse().unwrap();
        let failure = DuplicateFailure::from(GitError::Conflict {
            operation: mergebot_git::ConflictOperation::CherryPick,
            commit: Some(sha),
            detail: "CONFLICT (content)".into(),
        });
        assert_eq!(failure.kind(), Some(ErrorKind::Conflict));
        assert_eq!(failure.conflicting_commit(), Some(sha));
    }
}
