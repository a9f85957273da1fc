//! Replay-set resolution.
//!
//! After a host merges a pull request, the commits to duplicate depend on
//! how the merge was recorded on the base branch:
//!
//! - a true merge commit (two parents) keeps the authored commits intact,
//!   so the pull request's own chain is replayed;
//! - a rebase merge rewrites every authored commit, so the last N commits
//!   on the base branch's first-parent history are replayed instead.

use mergebot_hash::Sha;

use crate::{CommitChain, CommitGraph, ResolutionError};

/// How a merge was recorded on the base branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Two-parent merge commit; original commits are still valid.
    TrueMerge,
    /// Single-parent tip of a rebased (rewritten) chain.
    Rewritten,
    /// Parentless commit; cannot be the result of a pull request merge.
    Root,
}

impl Topology {
    pub fn classify(graph: &CommitGraph, result: &Sha) -> Result<Self, ResolutionError> {
        let commit = graph
            .get(result)
            .map_err(|_| ResolutionError::MissingCommit(*result))?;
        Ok(match commit.parents.len() {
            0 => Topology::Root,
            1 => Topology::Rewritten,
            _ => Topology::TrueMerge,
        })
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::TrueMerge => write!(f, "merge"),
            Topology::Rewritten => write!(f, "rebase"),
            Topology::Root => write!(f, "root"),
        }
    }
}

/// Compute the commits to cherry-pick, oldest first.
pub fn resolve(
    graph: &CommitGraph,
    chain: &CommitChain,
    result: &Sha,
) -> Result<Vec<Sha>, ResolutionError> {
    if chain.is_empty() {
        return Err(ResolutionError::EmptyChain);
    }

    match Topology::classify(graph, result)? {
        Topology::TrueMerge => Ok(chain.as_slice().to_vec()),
        Topology::Root => Err(ResolutionError::RootResult(*result)),
        Topology::Rewritten => walk_first_parents(graph, result, chain.len()),
    }
}

fn walk_first_parents(
    graph: &CommitGraph,
    result: &Sha,
    wanted: usize,
) -> Result<Vec<Sha>, ResolutionError> {
    let mut collected = Vec::with_capacity(wanted);
    let mut current = *result;

    loop {
        let commit = graph
            .get(&current)
            .map_err(|_| ResolutionError::MissingCommit(current))?;
        collected.push(commit.sha);
        if collected.len() == wanted {
            break;
        }
        match commit.parents.as_slice() {
            [parent] => current = *parent,
            [] => {
                return Err(ResolutionError::ShortHistory {
                    result: *result,
                    wanted,
                    found: collected.len(),
                })
            }
            _ => return Err(ResolutionError::MergeInHistory(commit.sha)),
        }
    }

    collected.reverse();
    Ok(collected)
}
