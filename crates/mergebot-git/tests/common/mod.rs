//! Local bare repositories standing in for a git host.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use mergebot_git::{ExecutorConfig, RetryPolicy};
use tempfile::TempDir;

/// Run git in `dir` with a fixed identity and no user configuration.
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

/// A bare "remote" repository plus a scratch clone used to author commits.
pub struct Upstream {
    pub root: TempDir,
    pub bare: PathBuf,
    pub work: PathBuf,
}

impl Upstream {
    /// Bare repo whose `main` branch holds one commit adding `a.txt`.
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let bare = root.path().join("remote.git");
        let work = root.path().join("work");
        std::fs::create_dir_all(&bare).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        git(&bare, &["init", "--quiet", "--bare"]);
        git(&work, &["init", "--quiet"]);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&work, &["remote", "add", "origin", bare.to_str().unwrap()]);

        let upstream = Self { root, bare, work };
        upstream.commit_file("a.txt", "base\n", "initial commit");
        upstream.push("main");
        upstream
    }

    pub fn url(&self) -> String {
        format!("file://{}", self.bare.display())
    }

    pub fn git(&self, args: &[&str]) -> String {
        git(&self.work, args)
    }

    /// Write `name` in the scratch clone and commit it; returns the sha.
    pub fn commit_file(&self, name: &str, content: &str, message: &str) -> String {
        std::fs::write(self.work.join(name), content).unwrap();
        self.git(&["add", name]);
        self.git(&["commit", "--quiet", "-m", message]);
        self.git(&["rev-parse", "HEAD"])
    }

    pub fn checkout_new(&self, branch: &str, from: &str) {
        self.git(&["checkout", "--quiet", "-b", branch, from]);
    }

    pub fn checkout(&self, branch: &str) {
        self.git(&["checkout", "--quiet", branch]);
    }

    pub fn push(&self, branch: &str) {
        self.git(&["push", "--quiet", "--force", "origin", branch]);
    }

    /// Resolve `rev` in the bare repository, if it exists there.
    pub fn remote_rev(&self, rev: &str) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", rev])
            .current_dir(&self.bare)
            .output()
            .unwrap();
        output
            .status
            .success()
            .then(|| String::from_utf8(output.stdout).unwrap().trim().to_string())
    }

    pub fn remote_git(&self, args: &[&str]) -> String {
        git(&self.bare, args)
    }
}

/// Executor settings for tests: workspaces under `root`, no retry delay.
pub fn test_config(root: &Path) -> ExecutorConfig {
    ExecutorConfig {
        temp_root: Some(root.to_path_buf()),
        command_timeout_secs: 60,
        retry: RetryPolicy {
            attempts: 3,
            delay_ms: 0,
        },
        ..ExecutorConfig::default()
    }
}

/// Number of entries directly below `dir`.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
