use std::fmt;

use mergebot_graph::{CommitChain, CommitGraph};
use mergebot_hash::Sha;
use serde::{Deserialize, Serialize};

/// A repository on the forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// `owner/name`.
    pub full_name: String,
    /// Left empty when the caller derives it from `full_name`.
    #[serde(default)]
    pub clone_url: String,
}

impl RepoRef {
    pub fn new(full_name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            clone_url: clone_url.into(),
        }
    }

    /// `host/path` of the clone URL, when it uses `protocol`.
    ///
    /// Userinfo is dropped and the path is kept as written, because git
    /// matches credentials against the URL path literally.
    pub fn credential_path(&self, protocol: &str) -> Option<String> {
        let rest = self
            .clone_url
            .strip_prefix(protocol)?
            .strip_prefix("://")?;
        let rest = match rest.split_once('@') {
            Some((userinfo, host)) if !userinfo.contains('/') => host,
            _ => rest,
        };
        let rest = rest.trim_end_matches('/');
        match rest.split_once('/') {
            Some((host, path)) if !host.is_empty() && !path.is_empty() => Some(rest.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// What an operation needs to know about one pull request.
///
/// Filled in by the host API client. `graph` may be left empty, in which
/// case history is read from the base repository when it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHandle {
    pub number: u64,
    pub head_repo: RepoRef,
    pub head_branch: String,
    pub base_repo: RepoRef,
    pub base_branch: String,
    #[serde(default)]
    pub merged: bool,
    /// Commits authored on the head branch, oldest first.
    pub commits: CommitChain,
    /// The commit the merge produced on the base branch.
    #[serde(default)]
    pub result: Option<Sha>,
    #[serde(default)]
    pub graph: CommitGraph,
}

/// The pull request is in the wrong state for the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("pull request #{0} is not merged")]
    NotMerged(u64),

    #[error("pull request #{0} is merged but its merge commit is unknown")]
    MissingResult(u64),

    #[error("pull request #{0} is already merged")]
    AlreadyMerged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_path_of_https_url() {
        let repo = RepoRef::new("owner/repo", "https://github.com/owner/repo.git");
        assert_eq!(
            repo.credential_path("https").as_deref(),
            Some("github.com/owner/repo.git")
        );
    }

    #[test]
    fn credential_path_drops_userinfo() {
        let repo = RepoRef::new("o/r", "https://bot@ghe.example.com/o/r/");
        assert_eq!(
            repo.credential_path("https").as_deref(),
            Some("ghe.example.com/o/r")
        );
    }

    #[test]
    fn credential_path_needs_matching_protocol() {
        let repo = RepoRef::new("o/r", "file:///srv/git/r.git");
        assert_eq!(repo.credential_path("https"), None);
        let repo = RepoRef::new("o/r", "https://github.com");
        assert_eq!(repo.credential_path("https"), None);
    }

    #[test]
    fn handle_from_yaml() {
        let yaml = "\
number: 42
head_repo: { full_name: contrib/app, clone_url: 'https://github.com/contrib/app.git' }
head_branch: fix
base_repo: { full_name: org/app, clone_url: 'https://github.com/org/app.git' }
base_branch: main
merged: true
commits:
  - '1111111111111111111111111111111111111111'
  - '2222222222222222222222222222222222222222'
result: '3333333333333333333333333333333333333333'
";
        let pr: PullRequestHandle = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.commits.len(), 2);
        assert!(pr.merged);
        assert!(pr.graph.is_empty());
        assert_eq!(pr.base_repo.to_string(), "org/app");
        assert_eq!(pr.result.unwrap().short(), "3333333");
    }

    #[test]
    fn precondition_messages() {
        assert_eq!(
            PreconditionError::NotMerged(7).to_string(),
            "pull request #7 is not merged"
        );
    }
}
