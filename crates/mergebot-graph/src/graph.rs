use std::collections::HashMap;

use mergebot_hash::Sha;
use serde::{Deserialize, Serialize};

use crate::GraphError;

/// One observed commit and its parents, first parent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: Sha,
    #[serde(default)]
    pub parents: Vec<Sha>,
}

impl Commit {
    pub fn new(sha: Sha, parents: impl IntoIterator<Item = Sha>) -> Self {
        Self {
            sha,
            parents: parents.into_iter().collect(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() == 2
    }
}

/// Commits known about a repository, keyed by sha.
///
/// Built once from host metadata (or `git rev-list --parents`) and then
/// only read. Parents may point outside the graph; lookups of such
/// commits fail with [`GraphError::MissingCommit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Commit>", into = "Vec<Commit>")]
pub struct CommitGraph {
    commits: HashMap<Sha, Commit>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a commit. Recording the same commit twice is allowed as long
    /// as the parents agree.
    pub fn insert(&mut self, commit: Commit) -> Result<(), GraphError> {
        if commit.parents.len() > 2 {
            return Err(GraphError::TooManyParents {
                sha: commit.sha,
                count: commit.parents.len(),
            });
        }
        if let Some(existing) = self.commits.get(&commit.sha) {
            if existing.parents != commit.parents {
                return Err(GraphError::Conflicting(commit.sha));
            }
            return Ok(());
        }
        self.commits.insert(commit.sha, commit);
        Ok(())
    }

    pub fn get(&self, sha: &Sha) -> Result<&Commit, GraphError> {
        self.commits
            .get(sha)
            .ok_or(GraphError::MissingCommit(*sha))
    }

    pub fn contains(&self, sha: &Sha) -> bool {
        self.commits.contains_key(sha)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Parse the output of `git rev-list --parents`: one commit per line,
    /// the commit's sha followed by its parents' shas.
    pub fn from_rev_list(output: &str) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for (idx, line) in output.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut names = line.split_ascii_whitespace().map(|name| {
                name.parse::<Sha>().map_err(|e| GraphError::Malformed {
                    line: idx + 1,
                    reason: e.to_string(),
                })
            });
            let sha = match names.next() {
                Some(sha) => sha?,
                None => continue,
            };
            let parents = names.collect::<Result<Vec<_>, _>>()?;
            graph.insert(Commit { sha, parents })?;
        }
        Ok(graph)
    }
}

impl TryFrom<Vec<Commit>> for CommitGraph {
    type Error = GraphError;

    fn try_from(commits: Vec<Commit>) -> Result<Self, Self::Error> {
        let mut graph = Self::new();
        for commit in commits {
            graph.insert(commit)?;
        }
        Ok(graph)
    }
}

impl From<CommitGraph> for Vec<Commit> {
    fn from(graph: CommitGraph) -> Self {
        let mut commits: Vec<Commit> = graph.commits.into_values().collect();
        commits.sort_by(|a, b| a.sha.cmp(&b.sha));
        commits
    }
}

/// The commits authored on a pull request's head branch, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitChain(Vec<Sha>);

impl CommitChain {
    pub fn new(commits: Vec<Sha>) -> Self {
        Self(commits)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Sha] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sha> {
        self.0.iter()
    }
}

impl FromIterator<Sha> for CommitChain {
    fn from_iter<I: IntoIterator<Item = Sha>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha(n: u8) -> Sha {
        Sha::Sha1([n; 20])
    }

    #[test]
    fn insert_and_get() {
        let mut graph = CommitGraph::new();
        graph.insert(Commit::new(sha(2), [sha(1)])).unwrap();
        assert_eq!(graph.get(&sha(2)).unwrap().parents, vec![sha(1)]);
        assert_eq!(graph.get(&sha(1)), Err(GraphError::MissingCommit(sha(1))));
    }

    #[test]
    fn octopus_rejected() {
        let mut graph = CommitGraph::new();
        let err = graph
            .insert(Commit::new(sha(9), [sha(1), sha(2), sha(3)]))
            .unwrap_err();
        assert_eq!(err, GraphError::TooManyParents { sha: sha(9), count: 3 });
    }

    #[test]
    fn reinsert_must_agree() {
        let mut graph = CommitGraph::new();
        graph.insert(Commit::new(sha(2), [sha(1)])).unwrap();
        graph.insert(Commit::new(sha(2), [sha(1)])).unwrap();
        assert_eq!(graph.len(), 1);
        let err = graph.insert(Commit::new(sha(2), [])).unwrap_err();
        assert_eq!(err, GraphError::Conflicting(sha(2)));
    }

    #[test]
    fn parse_rev_list_parents() {
        let a = "1".repeat(40);
        let b = "2".repeat(40);
        let m = "3".repeat(40);
        let output = format!("{m} {b} {a}\n{b} {a}\n{a}\n");
        let graph = CommitGraph::from_rev_list(&output).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.get(&m.parse().unwrap()).unwrap().is_merge());
        assert!(graph.get(&a.parse().unwrap()).unwrap().is_root());
    }

    #[test]
    fn parse_rev_list_reports_line() {
        let output = format!("{}\nnot-a-sha\n", "1".repeat(40));
        let err = CommitGraph::from_rev_list(&output).unwrap_err();
        assert!(matches!(err, GraphError::Malformed { line: 2, .. }));
    }
}
