use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::GitError;

/// Bounded retry of transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
    /// Pause between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay_ms: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempts are used up. `op` receives the 1-based attempt number.
    pub fn run<T>(&self, mut op: impl FnMut(u32) -> Result<T, GitError>) -> Result<T, GitError> {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Err(err) if err.kind().is_retryable() && attempt < attempts => {
                    warn!(attempt, attempts, error = %err, "transient git failure, retrying");
                    if self.delay_ms > 0 {
                        thread::sleep(self.delay());
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err.with_attempts(attempt)),
                Ok(value) => return Ok(value),
            }
        }
    }
}
