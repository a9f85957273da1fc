//! Collaborators supplied by the caller: the token source and the forge.

use std::collections::HashMap;

use mergebot_git::Secret;

use crate::RepoRef;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("no token configured for {0}")]
    Missing(String),

    #[error("token for {repo} unavailable: {reason}")]
    Unavailable { repo: String, reason: String },
}

/// Hands out access tokens per repository.
pub trait TokenSource: Send + Sync {
    fn token(&self, repo: &RepoRef) -> Result<Secret, TokenError>;
}

/// Fixed tokens keyed by repository full name, with an optional fallback.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, Secret>,
    fallback: Option<Secret>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `token` for every repository.
    pub fn for_all(token: Secret) -> Self {
        Self {
            tokens: HashMap::new(),
            fallback: Some(token),
        }
    }

    pub fn with(mut self, full_name: impl Into<String>, token: Secret) -> Self {
        self.tokens.insert(full_name.into(), token);
        self
    }
}

impl TokenSource for StaticTokens {
    fn token(&self, repo: &RepoRef) -> Result<Secret, TokenError> {
        self.tokens
            .get(&repo.full_name)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| TokenError::Missing(repo.full_name.clone()))
    }
}

/// A pull request to open for a pushed branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    /// Repository the pull request is opened in.
    pub repo: RepoRef,
    pub base: String,
    pub head: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Opens pull requests on the forge. Returns the new pull request number.
pub trait PullRequestHost {
    fn open_pull_request(&self, request: &NewPullRequest) -> Result<u64, HostError>;
}
