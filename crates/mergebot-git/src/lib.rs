//! Ephemeral git workspaces.
//!
//! A [`Workspace`] owns one temporary clone directory and runs `git`
//! subprocesses inside it. Credentials are installed into that clone's own
//! configuration, every command runs with user and system configuration
//! disabled, and every failure is classified as transient, conflict or
//! fatal before it reaches the caller.
//!
//! The directory is deleted when the workspace is released or dropped, so
//! every exit path, including errors and cancellation, cleans up.

pub mod cancel;
pub mod classify;
pub mod command;
pub mod config;
pub mod credential;
mod error;
pub mod retry;
pub mod runner;
mod workspace;

pub use cancel::CancelToken;
pub use classify::ErrorKind;
pub use config::{ExecutorConfig, Identity};
pub use credential::{Credential, Secret};
pub use error::{ConflictOperation, GitError};
pub use retry::RetryPolicy;
pub use runner::{GitRunner, Invocation, SystemGit};
pub use workspace::{Depth, MergeStrategy, PushMode, Workspace};

pub type Result<T> = std::result::Result<T, GitError>;
