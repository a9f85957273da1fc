use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mergebot_graph::CommitGraph;
use mergebot_hash::Sha;
use serde::Deserialize;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::classify::{classify, redact};
use crate::command::{CommandOutput, RunError};
use crate::credential::{Credential, CredentialTarget};
use crate::runner::{GitRunner, Invocation, SystemGit};
use crate::{CancelToken, ConflictOperation, ErrorKind, ExecutorConfig, GitError, Identity, Result};

/// File inside `.git` where the `store` helper keeps this workspace's tokens.
const CREDENTIAL_FILE: &str = "mergebot-credentials";

/// History depth requested by a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Full,
    Shallow(u32),
    /// Turn a shallow clone into a complete one.
    Unshallow,
}

/// How a push treats the remote branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMode {
    /// Reject anything that is not a fast-forward.
    FastForward,
    /// Overwrite the remote branch, provided it still matches what was
    /// fetched (`--force-with-lease`).
    Force,
}

/// Merge strategy passed to `git merge -s`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Whatever the installed git uses by default.
    #[default]
    Default,
    Ort,
    Recursive,
    Resolve,
}

impl MergeStrategy {
    fn flag(self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::Ort => Some("ort"),
            Self::Recursive => Some("recursive"),
            Self::Resolve => Some("resolve"),
        }
    }
}

/// An exclusively owned, throwaway git repository.
///
/// Obtained only through [`Workspace::initialize`] (or
/// [`Workspace::initialize_with`]), which creates the directory and runs
/// `git init`. The directory and the in-memory credentials are discarded
/// by [`Workspace::release`], or by `Drop` if the workspace goes out of
/// scope first. Commands inside one workspace run strictly one at a time.
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    config: ExecutorConfig,
    runner: Arc<dyn GitRunner>,
    cancel: CancelToken,
    credentials: Vec<Credential>,
    helper_installed: bool,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("path", &self.path)
            .field("credentials", &self.credentials.len())
            .field("released", &self.dir.is_none())
            .finish()
    }
}

impl Workspace {
    /// Create a workspace that runs the configured git binary.
    pub fn initialize(config: &ExecutorConfig) -> Result<Self> {
        let runner = Arc::new(SystemGit::new(config.git_program.clone()));
        Self::initialize_with(config, runner, CancelToken::new())
    }

    /// Create a workspace with an explicit runner and cancellation token.
    pub fn initialize_with(
        config: &ExecutorConfig,
        runner: Arc<dyn GitRunner>,
        cancel: CancelToken,
    ) -> Result<Self> {
        if cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("mergebot-");
        let dir = match config.temp_root {
            Some(ref root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let path = dir.path().to_path_buf();

        let workspace = Self {
            dir: Some(dir),
            path,
            config: config.clone(),
            runner,
            cancel,
            credentials: Vec::new(),
            helper_installed: false,
        };
        info!(path = %workspace.path.display(), "workspace created");
        workspace.git(&["init", "--quiet"])?;
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Set the commit author/committer for this repository only.
    pub fn configure_identity(&mut self, identity: &Identity) -> Result<()> {
        self.git(&["config", "--local", "user.name", &identity.name])?;
        self.git(&["config", "--local", "user.email", &identity.email])?;
        Ok(())
    }

    /// Install `credential` for `host_path` (`host/owner/repo`).
    ///
    /// The first call points this repository's `credential.helper` at a
    /// store file inside `.git`; the token is then handed to the helper on
    /// stdin and never appears on a command line.
    #[instrument(skip_all, fields(remote = %credential.remote, host_path = %host_path))]
    pub fn add_credential(&mut self, credential: Credential, host_path: &str) -> Result<()> {
        let target = CredentialTarget::parse(&self.config.protocol, host_path).ok_or_else(|| {
            GitError::Fatal {
                command: "credential".to_string(),
                detail: format!("invalid credential target '{host_path}'"),
            }
        })?;

        if !self.helper_installed {
            let store = self.path.join(".git").join(CREDENTIAL_FILE);
            let helper = format!("store --file='{}'", store.display());
            self.git(&["config", "--local", "credential.useHttpPath", "true"])?;
            self.git(&["config", "--local", "credential.helper", &helper])?;
            self.helper_installed = true;
        }

        let input = target.helper_input(&credential);
        // Registered first so the token is redacted from any failure output.
        self.credentials.push(credential);

        let mut invocation = self.invocation(&["credential", "approve"]);
        invocation.input = Some(input.into_bytes());
        self.invoke(invocation)?;
        info!(host = %target.host, path = %target.path, "credential installed");
        Ok(())
    }

    pub fn add_remote(&mut self, name: &str, url: &str) -> Result<()> {
        self.git(&["remote", "add", name, url])?;
        Ok(())
    }

    /// Fetch `branches` from `remote` into `refs/remotes/<remote>/<branch>`.
    ///
    /// Transient failures are retried according to the configured policy.
    #[instrument(skip(self), fields(workspace = %self.path.display()))]
    pub fn fetch(&mut self, remote: &str, branches: &[&str], depth: Depth) -> Result<()> {
        let mut args = vec![
            "fetch".to_string(),
            "--quiet".to_string(),
            "--no-tags".to_string(),
        ];
        match depth {
            Depth::Full => {}
            Depth::Shallow(n) => args.push(format!("--depth={}", n.max(1))),
            Depth::Unshallow if self.is_shallow() => args.push("--unshallow".to_string()),
            Depth::Unshallow => {}
        }
        args.push(remote.to_string());
        for branch in branches {
            args.push(format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}"));
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        self.config.retry.run(|attempt| {
            debug!(attempt, "fetching");
            self.git(&args)
        })?;
        Ok(())
    }

    pub fn checkout_new_branch(&mut self, from_ref: &str, branch: &str) -> Result<()> {
        self.git(&["checkout", "--quiet", "-b", branch, from_ref])?;
        Ok(())
    }

    /// Apply `commits` in order, one `git cherry-pick -x` each.
    ///
    /// Stops at the first failure. A conflict aborts the in-progress
    /// cherry-pick and is reported with the commit that could not be
    /// applied. Returns the new HEAD.
    #[instrument(skip_all, fields(workspace = %self.path.display(), count = commits.len()))]
    pub fn cherry_pick(&mut self, commits: &[Sha]) -> Result<Sha> {
        for commit in commits {
            let hex = commit.to_hex();
            match self.git(&["cherry-pick", "-x", &hex]) {
                Ok(_) => debug!(commit = %commit.short(), "cherry-picked"),
                Err(err) if err.kind() == ErrorKind::Conflict => {
                    warn!(commit = %commit.short(), "cherry-pick conflict");
                    self.abort("cherry-pick");
                    return Err(GitError::Conflict {
                        operation: ConflictOperation::CherryPick,
                        commit: Some(*commit),
                        detail: conflict_detail(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
        self.head()
    }

    /// Rebase the checked-out branch onto `onto`. Returns the new HEAD.
    #[instrument(skip(self), fields(workspace = %self.path.display()))]
    pub fn rebase(&mut self, onto: &str) -> Result<Sha> {
        match self.git(&["rebase", onto]) {
            Ok(_) => self.head(),
            Err(err) if err.kind() == ErrorKind::Conflict => {
                let stopped = self.try_rev_parse("REBASE_HEAD");
                warn!(commit = ?stopped, "rebase conflict");
                self.abort("rebase");
                Err(GitError::Conflict {
                    operation: ConflictOperation::Rebase,
                    commit: stopped,
                    detail: conflict_detail(err),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Merge `other` into the checked-out branch. Returns the new HEAD.
    #[instrument(skip(self, message), fields(workspace = %self.path.display()))]
    pub fn merge(
        &mut self,
        other: &str,
        strategy: MergeStrategy,
        message: Option<&str>,
    ) -> Result<Sha> {
        let mut args = vec!["merge", "--no-edit"];
        if let Some(flag) = strategy.flag() {
            args.extend(["-s", flag]);
        }
        if let Some(message) = message {
            args.extend(["-m", message]);
        }
        args.push(other);

        match self.git(&args) {
            Ok(_) => self.head(),
            Err(err) if err.kind() == ErrorKind::Conflict => {
                let merging = self.try_rev_parse("MERGE_HEAD");
                warn!(commit = ?merging, "merge conflict");
                self.abort("merge");
                Err(GitError::Conflict {
                    operation: ConflictOperation::Merge,
                    commit: merging,
                    detail: conflict_detail(err),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Push `refspecs` to `remote`, retrying transient failures.
    #[instrument(skip(self), fields(workspace = %self.path.display()))]
    pub fn push(&mut self, remote: &str, refspecs: &[&str], mode: PushMode) -> Result<()> {
        let mut args = vec!["push", "--quiet"];
        if mode == PushMode::Force {
            args.push("--force-with-lease");
        }
        args.push(remote);
        args.extend_from_slice(refspecs);

        self.config.retry.run(|attempt| {
            debug!(attempt, "pushing");
            self.git(&args)
        })?;
        info!(remote, ?refspecs, ?mode, "pushed");
        Ok(())
    }

    /// Resolve `rev` to a commit.
    pub fn rev_parse(&self, rev: &str) -> Result<Sha> {
        let spec = format!("{rev}^{{commit}}");
        let out = self.git(&["rev-parse", "--verify", &spec])?;
        parse_sha("rev-parse", &out)
    }

    pub fn head(&self) -> Result<Sha> {
        self.rev_parse("HEAD")
    }

    /// Best common ancestor of `a` and `b`, or `None` if the histories
    /// available locally do not meet.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<Sha>> {
        let out = self.invoke_raw(self.invocation(&["merge-base", a, b]))?;
        match out.code {
            Some(0) => parse_sha("merge-base", &out).map(Some),
            Some(1) if out.stdout_text().is_empty() => Ok(None),
            _ => Err(self.failure("merge-base", &out)),
        }
    }

    pub fn is_shallow(&self) -> bool {
        self.path.join(".git").join("shallow").exists()
    }

    /// Read the first-parent history of `tip`, at most `max_count`
    /// commits, into a graph. Each commit keeps its full parent list.
    pub fn log_graph(&self, tip: &str, max_count: usize) -> Result<CommitGraph> {
        let limit = format!("--max-count={max_count}");
        let out = self.git(&["rev-list", "--parents", "--first-parent", &limit, tip])?;
        CommitGraph::from_rev_list(&out.stdout_text()).map_err(|e| GitError::Fatal {
            command: "rev-list".to_string(),
            detail: e.to_string(),
        })
    }

    /// Delete the directory and forget every credential.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        self.credentials.clear();
        match self.dir.take() {
            Some(dir) => {
                dir.close()?;
                info!(path = %self.path.display(), "workspace released");
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn try_rev_parse(&self, rev: &str) -> Option<Sha> {
        self.rev_parse(rev).ok()
    }

    fn abort(&self, subcommand: &str) {
        if let Err(err) = self.git(&[subcommand, "--abort"]) {
            warn!(subcommand, error = %err, "abort failed; workspace will be discarded");
        }
    }

    fn invocation(&self, args: &[&str]) -> Invocation {
        Invocation::new(&self.path, args, self.config.command_timeout())
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        self.invoke(self.invocation(args))
    }

    fn invoke(&self, invocation: Invocation) -> Result<CommandOutput> {
        let subcommand = invocation.subcommand().to_string();
        let out = self.invoke_raw(invocation)?;
        if out.success() {
            Ok(out)
        } else {
            Err(self.failure(&subcommand, &out))
        }
    }

    /// Run an invocation, mapping only spawn errors, timeouts and
    /// cancellation. A non-zero exit is returned as output.
    fn invoke_raw(&self, invocation: Invocation) -> Result<CommandOutput> {
        if self.cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        let command = self.redact(&invocation.args.join(" "));
        let started = Instant::now();
        debug!(%command, "git");

        match self.runner.run(&invocation) {
            Ok(out) => {
                debug!(
                    %command,
                    code = ?out.code,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "git finished"
                );
                Ok(out)
            }
            Err(err @ RunError::Timeout { .. }) => {
                warn!(%command, "git timed out");
                Err(GitError::Transient {
                    command: invocation.subcommand().to_string(),
                    detail: self.redact(&err.to_string()),
                    attempts: 1,
                })
            }
            Err(err @ RunError::Spawn { .. }) => Err(GitError::Fatal {
                command: invocation.subcommand().to_string(),
                detail: self.redact(&err.to_string()),
            }),
        }
    }

    fn failure(&self, subcommand: &str, out: &CommandOutput) -> GitError {
        let detail = self.redact(&out.combined_text());
        let command = subcommand.to_string();
        match classify(out) {
            ErrorKind::Transient => GitError::Transient {
                command,
                detail,
                attempts: 1,
            },
            ErrorKind::Conflict => GitError::Conflict {
                operation: match subcommand {
                    "cherry-pick" => ConflictOperation::CherryPick,
                    "rebase" => ConflictOperation::Rebase,
                    _ => ConflictOperation::Merge,
                },
                commit: None,
                detail,
            },
            ErrorKind::Fatal | ErrorKind::Cancelled => GitError::Fatal { command, detail },
        }
    }

    fn redact(&self, text: &str) -> String {
        redact(text, self.credentials.iter().map(|c| c.token.expose()))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.dir.is_some() {
            debug!(path = %self.path.display(), "workspace dropped before release");
            if let Err(err) = self.release_inner() {
                warn!(path = %self.path.display(), error = %err, "failed to remove workspace");
            }
        }
    }
}

fn conflict_detail(err: GitError) -> String {
    match err {
        GitError::Conflict { detail, .. } => detail,
        other => other.to_string(),
    }
}

fn parse_sha(command: &str, out: &CommandOutput) -> Result<Sha> {
    out.stdout_text().parse().map_err(|e| GitError::Fatal {
        command: command.to_string(),
        detail: format!("unexpected output '{}': {e}", out.stdout_text()),
    })
}
