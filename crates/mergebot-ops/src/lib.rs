//! Pull request operations built from workspace primitives.
//!
//! [`Synchronizer`] brings a pull request's head branch up to date with its
//! base branch by merge or rebase. [`Duplicator`] copies the changes of a
//! merged pull request onto other branches, one isolated workspace per
//! target. Neither talks to a forge API directly: tokens come from a
//! [`TokenSource`] and follow-up pull requests are opened through a
//! [`PullRequestHost`] supplied by the caller.

mod config;
mod context;
mod duplicate;
mod host;
mod pull;
mod sync;

pub use config::{DuplicateConfig, SyncConfig};
pub use context::{GitContext, TOKEN_USERNAME};
pub use duplicate::{
    DuplicateFailure, DuplicateReport, Duplicator, PullRequestResult, TargetOutcome, TargetReport,
};
pub use host::{
    HostError, NewPullRequest, PullRequestHost, StaticTokens, TokenError, TokenSource,
};
pub use pull::{PreconditionError, PullRequestHandle, RepoRef};
pub use sync::{SyncError, SyncOutcome, SyncStrategy, Synchronizer};
