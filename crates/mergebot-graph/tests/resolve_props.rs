use mergebot_graph::{resolve, Commit, CommitChain, CommitGraph, ResolutionError};
use mergebot_hash::Sha;
use proptest::prelude::*;

fn sha(tag: u8, n: usize) -> Sha {
    let mut bytes = [0u8; 20];
    bytes[0] = tag;
    bytes[12..20].copy_from_slice(&(n as u64).to_be_bytes());
    Sha::Sha1(bytes)
}

/// A linear history of `len` commits on the base branch; returns it oldest first.
fn base_history(graph: &mut CommitGraph, len: usize) -> Vec<Sha> {
    let mut history = Vec::with_capacity(len);
    let mut parent = None;
    for n in 0..len {
        let commit = sha(b'b', n);
        graph.insert(Commit::new(commit, parent)).unwrap();
        history.push(commit);
        parent = Some(commit);
    }
    history
}

fn authored_chain(n: usize) -> CommitChain {
    (0..n).map(|i| sha(b'c', i)).collect()
}

proptest! {
    #[test]
    fn two_parent_result_returns_chain(n in 1usize..20, base_len in 1usize..10) {
        let mut graph = CommitGraph::new();
        let history = base_history(&mut graph, base_len);
        let chain = authored_chain(n);
        let merge = sha(b'm', 0);
        graph
            .insert(Commit::new(merge, [*history.last().unwrap(), sha(b'c', n - 1)]))
            .unwrap();

        prop_assert_eq!(resolve(&graph, &chain, &merge).unwrap(), chain.as_slice().to_vec());
    }

    #[test]
    fn one_parent_result_returns_last_n_ancestors(n in 1usize..20, extra in 1usize..10) {
        let mut graph = CommitGraph::new();
        let history = base_history(&mut graph, n + extra);
        let chain = authored_chain(n);
        let result = *history.last().unwrap();

        let replay = resolve(&graph, &chain, &result).unwrap();
        prop_assert_eq!(replay.len(), n);
        prop_assert_eq!(&replay[..], &history[history.len() - n..]);
    }

    #[test]
    fn short_single_parent_history_is_an_error(n in 2usize..20, shortfall in 1usize..10) {
        let available = n.saturating_sub(shortfall).max(1);
        prop_assume!(available < n);
        let mut graph = CommitGraph::new();
        let history = base_history(&mut graph, available);
        let chain = authored_chain(n);
        let result = *history.last().unwrap();

        let err = resolve(&graph, &chain, &result).unwrap_err();
        match available {
            1 => prop_assert_eq!(err, ResolutionError::RootResult(result)),
            _ => prop_assert_eq!(
                err,
                ResolutionError::ShortHistory { result, wanted: n, found: available }
            ),
        }
    }
}
