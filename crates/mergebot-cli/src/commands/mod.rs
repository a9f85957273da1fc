pub mod duplicate;
pub mod resolve;
pub mod sync;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use mergebot_ops::PullRequestHandle;

use crate::config::Config;
use crate::Cli;

#[derive(Subcommand)]
pub enum Commands {
    /// Print the commits a duplication would cherry-pick, oldest first
    Resolve(resolve::ResolveArgs),
    /// Merge or rebase a pull request's head branch onto its base branch
    Sync(sync::SyncArgs),
    /// Copy a merged pull request onto other branches
    Duplicate(duplicate::DuplicateArgs),
}

pub fn run(cli: &Cli, config: &Config) -> Result<i32> {
    match &cli.command {
        Commands::Resolve(args) => resolve::run(args),
        Commands::Sync(args) => sync::run(args, config),
        Commands::Duplicate(args) => duplicate::run(args, config),
    }
}

/// Read a pull request file, filling in clone URLs it leaves out.
pub(crate) fn load_pull_request(path: &Path, config: &Config) -> Result<PullRequestHandle> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pull request file: {}", path.display()))?;
    let mut pr: PullRequestHandle = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse pull request file: {}", path.display()))?;
    config.fill_clone_url(&mut pr.head_repo);
    config.fill_clone_url(&mut pr.base_repo);
    Ok(pr)
}
