//! The seam between a workspace and the `git` binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{CommandOutput, GitCommand, RunError};

/// Environment applied to every git invocation.
///
/// User and system configuration are disabled so only the workspace's own
/// `.git/config` is read, and interactive prompts are turned off.
pub fn isolated_env() -> Vec<(String, String)> {
    let null_device = if cfg!(windows) { "NUL" } else { "/dev/null" };
    vec![
        ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ("GIT_CONFIG_NOSYSTEM".to_string(), "1".to_string()),
        ("GIT_CONFIG_GLOBAL".to_string(), null_device.to_string()),
        ("GIT_ASKPASS".to_string(), String::new()),
        ("LC_ALL".to_string(), "C".to_string()),
    ]
}

/// One git invocation inside a workspace.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub dir: PathBuf,
    /// Arguments after `git`.
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Bytes fed on stdin. May hold secrets; never logged.
    pub input: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(dir: &Path, args: &[&str], timeout: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: isolated_env(),
            input: None,
            timeout,
        }
    }

    /// The git subcommand (first argument), for logs and errors.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

/// Executes git invocations. Implementations must be usable from several
/// threads because duplication runs targets concurrently.
pub trait GitRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError>;
}

/// Runs the real `git` binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: PathBuf,
}

impl SystemGit {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitRunner for SystemGit {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunError> {
        let mut cmd = GitCommand::new(&self.program)
            .args(&invocation.args)
            .working_dir(&invocation.dir)
            .timeout(invocation.timeout);
        for (key, value) in &invocation.env {
            cmd = cmd.env(key, value);
        }
        if let Some(ref input) = invocation.input {
            cmd = cmd.input(input.clone());
        }
        cmd.run()
    }
}
