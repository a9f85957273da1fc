use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mergebot_graph::{resolve, CommitChain, CommitGraph, Topology};
use mergebot_hash::Sha;

#[derive(Args)]
pub struct ResolveArgs {
    /// Commit graph file: a YAML list of `sha` and `parents`
    #[arg(long)]
    graph: PathBuf,

    /// Pull request commits, oldest first
    #[arg(long, value_delimiter = ',', required = true)]
    chain: Vec<Sha>,

    /// Commit the merge produced on the base branch
    #[arg(long)]
    result: Sha,
}

pub fn run(args: &ResolveArgs) -> Result<i32> {
    let contents = std::fs::read_to_string(&args.graph)
        .with_context(|| format!("failed to read graph file: {}", args.graph.display()))?;
    let graph: CommitGraph = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse graph file: {}", args.graph.display()))?;
    let chain: CommitChain = args.chain.iter().copied().collect();

    let resolved = Topology::classify(&graph, &args.result).and_then(|topology| {
        tracing::info!(%topology, result = %args.result.short(), "merge shape");
        resolve(&graph, &chain, &args.result)
    });
    let commits = match resolved {
        Ok(commits) => commits,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(1);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for sha in commits {
        writeln!(out, "{sha}")?;
    }
    Ok(0)
}
