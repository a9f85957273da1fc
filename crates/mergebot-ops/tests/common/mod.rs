//! A scratch author clone pushing to local bare repositories.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use mergebot_git::{ExecutorConfig, Identity, RetryPolicy, Secret};
use mergebot_hash::Sha;
use mergebot_ops::{GitContext, RepoRef, StaticTokens, TokenSource};
use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_AUTHOR_NAME", "Test Author")
        .env("GIT_AUTHOR_EMAIL", "author@test.com")
        .env("GIT_COMMITTER_NAME", "Test Committer")
        .env("GIT_COMMITTER_EMAIL", "committer@test.com")
        .output()
        .expect("failed to run git");
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

pub fn sha(hex: &str) -> Sha {
    hex.parse().unwrap()
}

pub struct Fixture {
    pub root: TempDir,
    pub work: PathBuf,
    pub workspaces: PathBuf,
}

impl Fixture {
    /// An empty author clone on branch `main`.
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        let workspaces = root.path().join("workspaces");
        std::fs::create_dir_all(&work).unwrap();
        std::fs::create_dir_all(&workspaces).unwrap();
        git(&work, &["init", "--quiet"]);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        Self {
            root,
            work,
            workspaces,
        }
    }

    /// Create bare repository `name` and register it as a remote of the
    /// author clone under the same name.
    pub fn bare(&self, name: &str) -> RepoRef {
        let path = self.root.path().join(format!("{name}.git"));
        std::fs::create_dir_all(&path).unwrap();
        git(&path, &["init", "--quiet", "--bare"]);
        self.git(&["remote", "add", name, path.to_str().unwrap()]);
        RepoRef::new(format!("org/{name}"), format!("file://{}", path.display()))
    }

    pub fn git(&self, args: &[&str]) -> String {
        git(&self.work, args)
    }

    pub fn commit(&self, file: &str, content: &str, message: &str) -> Sha {
        std::fs::write(self.work.join(file), content).unwrap();
        self.git(&["add", file]);
        self.git(&["commit", "--quiet", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> Sha {
        sha(&self.git(&["rev-parse", "HEAD"]))
    }

    pub fn checkout_new(&self, branch: &str, from: &str) {
        self.git(&["checkout", "--quiet", "-b", branch, from]);
    }

    pub fn checkout(&self, branch: &str) {
        self.git(&["checkout", "--quiet", branch]);
    }

    pub fn push(&self, remote: &str, branch: &str) {
        self.git(&["push", "--quiet", "--force", remote, branch]);
    }

    /// The tip of `branch` in bare repository `name`.
    pub fn rev(&self, name: &str, branch: &str) -> Option<Sha> {
        let path = self.root.path().join(format!("{name}.git"));
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .current_dir(&path)
            .output()
            .unwrap();
        output
            .status
            .success()
            .then(|| sha(String::from_utf8(output.stdout).unwrap().trim()))
    }

    /// Run git inside bare repository `name`.
    pub fn remote_git(&self, name: &str, args: &[&str]) -> String {
        git(&self.root.path().join(format!("{name}.git")), args)
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            temp_root: Some(self.workspaces.clone()),
            command_timeout_secs: 60,
            retry: RetryPolicy {
                attempts: 3,
                delay_ms: 0,
            },
            ..ExecutorConfig::default()
        }
    }

    pub fn context(&self) -> GitContext {
        self.context_with(Arc::new(StaticTokens::for_all(Secret::new("test-token"))))
    }

    pub fn context_with(&self, tokens: Arc<dyn TokenSource>) -> GitContext {
        GitContext::new(self.executor(), Identity::default(), tokens)
    }

    /// Workspaces still on disk.
    pub fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(&self.workspaces).unwrap().count()
    }
}
