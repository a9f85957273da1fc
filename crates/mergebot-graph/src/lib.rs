//! Commit graph model and replay-set resolution.
//!
//! A host reports the commits of a pull request and the commit its merge
//! produced on the base branch. This crate holds that metadata as a
//! read-only graph addressed by sha, and decides which commits must be
//! cherry-picked to duplicate the pull request onto another branch.

mod graph;
mod resolve;

pub use graph::{Commit, CommitChain, CommitGraph};
pub use resolve::{resolve, Topology};

use mergebot_hash::Sha;

/// Errors raised while building a commit graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("commit {sha} has {count} parents; at most 2 are supported")]
    TooManyParents { sha: Sha, count: usize },

    #[error("commit {0} was recorded twice with different parents")]
    Conflicting(Sha),

    #[error("commit not found: {0}")]
    MissingCommit(Sha),

    #[error("malformed rev-list line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// The commit topology does not match a supported merge shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("pull request has no commits")]
    EmptyChain,

    #[error("commit not found in graph: {0}")]
    MissingCommit(Sha),

    #[error("result commit {0} is a root commit")]
    RootResult(Sha),

    #[error(
        "history of {result} holds {found} single-parent commits but the pull request has {wanted} \
         (squash merges are not supported)"
    )]
    ShortHistory { result: Sha, wanted: usize, found: usize },

    #[error("merge commit {0} interrupts the rewritten history")]
    MergeInHistory(Sha),
}
