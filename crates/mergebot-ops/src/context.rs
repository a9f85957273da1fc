use std::fmt;
use std::sync::Arc;

use mergebot_git::{
    CancelToken, Credential, ExecutorConfig, GitError, GitRunner, Identity, SystemGit, Workspace,
};
use tracing::debug;

use crate::{RepoRef, TokenError, TokenSource};

/// Username sent with installation tokens.
pub const TOKEN_USERNAME: &str = "x-access-token";

/// Everything an operation needs to acquire and connect workspaces.
#[derive(Clone)]
pub struct GitContext {
    pub executor: ExecutorConfig,
    pub identity: Identity,
    tokens: Arc<dyn TokenSource>,
    runner: Arc<dyn GitRunner>,
    cancel: CancelToken,
}

impl fmt::Debug for GitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitContext")
            .field("executor", &self.executor)
            .field("identity", &self.identity)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

pub(crate) enum ConnectError {
    Token(TokenError),
    Git(GitError),
}

impl From<GitError> for ConnectError {
    fn from(err: GitError) -> Self {
        ConnectError::Git(err)
    }
}

impl GitContext {
    pub fn new(executor: ExecutorConfig, identity: Identity, tokens: Arc<dyn TokenSource>) -> Self {
        let runner = Arc::new(SystemGit::new(executor.git_program.clone()));
        Self {
            executor,
            identity,
            tokens,
            runner,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn GitRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// A fresh workspace with the commit identity configured.
    pub(crate) fn workspace(&self) -> Result<Workspace, GitError> {
        let mut ws =
            Workspace::initialize_with(&self.executor, self.runner.clone(), self.cancel.clone())?;
        ws.configure_identity(&self.identity)?;
        Ok(ws)
    }

    /// Add `repo` as `remote`, with a token when its URL can carry one.
    pub(crate) fn connect(
        &self,
        ws: &mut Workspace,
        remote: &str,
        repo: &RepoRef,
    ) -> Result<(), ConnectError> {
        match repo.credential_path(&self.executor.protocol) {
            Some(host_path) => {
                let token = self.tokens.token(repo).map_err(ConnectError::Token)?;
                let credential = Credential::new(remote, TOKEN_USERNAME, token);
                ws.add_credential(credential, &host_path)?;
            }
            None => debug!(%repo, remote, "remote URL takes no credential"),
        }
        ws.add_remote(remote, &repo.clone_url)?;
        Ok(())
    }
}
