//! Subprocess execution with captured output, stdin input and a deadline.

use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use bstr::{BString, ByteSlice};

/// How long to sleep between polls of a running child.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: BString,
    pub stderr: BString,
}

impl CommandOutput {
    /// Build a successful output carrying `stdout`.
    pub fn ok(stdout: impl Into<BString>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: BString::default(),
        }
    }

    /// Build a failed output with the given exit code and stderr text.
    pub fn failed(code: i32, stderr: impl Into<BString>) -> Self {
        Self {
            code: Some(code),
            stdout: BString::default(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout as trimmed, lossily decoded text.
    pub fn stdout_text(&self) -> String {
        self.stdout.trim().to_str_lossy().into_owned()
    }

    /// Stdout and stderr joined, for classification and error reports.
    pub fn combined_text(&self) -> String {
        let mut text = self.stdout.trim().to_str_lossy().into_owned();
        let stderr = self.stderr.trim().to_str_lossy();
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        text
    }
}

/// Errors that prevent a subprocess from producing an exit status.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} timed out after {after:?}")]
    Timeout { command: String, after: Duration },
}

/// Builder for one subprocess invocation.
///
/// Stdout and stderr are always captured. Both pipes are drained on
/// helper threads so a chatty child cannot block on a full pipe while
/// the deadline is being polled.
pub struct GitCommand {
    program: OsString,
    args: Vec<OsString>,
    env_vars: Vec<(OsString, OsString)>,
    input: Option<Vec<u8>>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl GitCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env_vars: Vec::new(),
            input: None,
            working_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, val: impl AsRef<OsStr>) -> Self {
        self.env_vars
            .push((key.as_ref().to_os_string(), val.as_ref().to_os_string()));
        self
    }

    /// Bytes written to the child's stdin; stdin is closed afterwards.
    pub fn input(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.input = Some(bytes.into());
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Program name and arguments, for logs and error messages.
    pub fn command_string(&self) -> String {
        let mut s = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            s.push(' ');
            s.push_str(&arg.to_string_lossy());
        }
        s
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env_vars.iter().map(|(k, v)| (k, v)));
        cmd.stdin(if self.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run the command to completion (or until the deadline passes).
    pub fn run(&self) -> Result<CommandOutput, RunError> {
        let command = self.command_string();
        let spawn_err = |source| RunError::Spawn {
            command: command.clone(),
            source,
        };

        let mut child = self.build_command().spawn().map_err(spawn_err)?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        if let (Some(mut stdin), Some(input)) = (child.stdin.take(), self.input.as_ref()) {
            // A child that exits without reading its input closes the pipe;
            // its exit status tells the real story.
            let _ = stdin.write_all(input);
        }

        let started = Instant::now();
        let status = loop {
            match child.try_wait().map_err(spawn_err)? {
                Some(status) => break status,
                None => {
                    if let Some(limit) = self.timeout {
                        if started.elapsed() > limit {
                            let _ = child.kill();
                            let _ = child.wait();
                            return Err(RunError::Timeout {
                                command: command.clone(),
                                after: limit,
                            });
                        }
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        Ok(CommandOutput {
            code: status.code(),
            stdout: join(stdout),
            stderr: join(stderr),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join(handle: Option<thread::JoinHandle<Vec<u8>>>) -> BString {
    handle
        .and_then(|h| h.join().ok())
        .map(BString::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let out = GitCommand::new("echo").arg("hello").run().unwrap();
        assert!(out.success());
        assert_eq!(out.stdout_text(), "hello");
    }

    #[test]
    fn captures_stderr_and_exit_code() {
        let out = GitCommand::new("sh")
            .args(["-c", "echo oops >&2; exit 42"])
            .run()
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.code, Some(42));
        assert_eq!(out.combined_text(), "oops");
    }

    #[test]
    fn feeds_stdin() {
        let out = GitCommand::new("cat").input("piped input").run().unwrap();
        assert_eq!(out.stdout, "piped input");
    }

    #[test]
    fn passes_environment() {
        let out = GitCommand::new("sh")
            .args(["-c", "echo $MERGEBOT_TEST_VAR"])
            .env("MERGEBOT_TEST_VAR", "from-env")
            .run()
            .unwrap();
        assert_eq!(out.stdout_text(), "from-env");
    }

    #[test]
    fn honours_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = GitCommand::new("pwd").working_dir(dir.path()).run().unwrap();
        let expected = dir.path().canonicalize().unwrap();
        let actual = Path::new(&out.stdout_text()).canonicalize().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn kills_on_timeout() {
        let err = GitCommand::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(50))
            .run()
            .unwrap_err();
        assert!(matches!(err, RunError::Timeout { .. }));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = GitCommand::new("mergebot-no-such-program").run().unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn large_output_does_not_block() {
        let out = GitCommand::new("sh")
            .args(["-c", "head -c 1000000 /dev/zero"])
            .timeout(Duration::from_secs(10))
            .run()
            .unwrap();
        assert_eq!(out.stdout.len(), 1_000_000);
    }
}
