//! Failure classification and secret redaction for git output.
//!
//! The classification is closed: every failed invocation maps to exactly
//! one [`ErrorKind`], decided from the exit status and captured output.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::command::CommandOutput;

/// What a failed git invocation means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network or timeout trouble; the same command may succeed later.
    Transient,
    /// Content conflict while applying changes; needs a human.
    Conflict,
    /// Bad repository or ref state; retrying cannot help.
    Fatal,
    /// The caller cancelled the operation between steps.
    Cancelled,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        self == ErrorKind::Transient
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const CONFLICT_MARKERS: &[&str] = &[
    "CONFLICT (",
    "could not apply",
    "Automatic merge failed",
    "after resolving the conflicts",
    "Resolve all conflicts manually",
    "needs merge",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "Could not resolve host",
    "Connection timed out",
    "Operation timed out",
    "Connection reset",
    "Connection refused",
    "Failed to connect",
    "remote end hung up unexpectedly",
    "early EOF",
    "RPC failed",
    "TLS connection was non-properly terminated",
    "The requested URL returned error: 500",
    "The requested URL returned error: 502",
    "The requested URL returned error: 503",
    "The requested URL returned error: 504",
];

/// Classify a failed invocation. Successful output is never passed here.
pub fn classify(output: &CommandOutput) -> ErrorKind {
    let text = output.combined_text();
    if CONFLICT_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorKind::Conflict
    } else if TRANSIENT_MARKERS.iter().any(|m| text.contains(m)) {
        ErrorKind::Transient
    } else {
        ErrorKind::Fatal
    }
}

fn userinfo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"://[^/@\s]+@").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
    })
}

/// Remove URL userinfo and any of `secrets` from `text`.
pub fn redact<'a>(text: &str, secrets: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = userinfo_pattern().replace_all(text, "://***@").into_owned();
    for secret in secrets {
        if !secret.is_empty() {
            out = out.replace(secret, "***");
        }
    }
    out
}
