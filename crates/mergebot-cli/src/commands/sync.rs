use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use mergebot_git::ErrorKind;
use mergebot_ops::{SyncOutcome, SyncStrategy, Synchronizer};

use super::load_pull_request;
use crate::config::Config;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Merge,
    Rebase,
}

impl From<StrategyArg> for SyncStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Merge => SyncStrategy::Merge,
            StrategyArg::Rebase => SyncStrategy::Rebase,
        }
    }
}

#[derive(Args)]
pub struct SyncArgs {
    /// Pull request file (YAML)
    #[arg(long)]
    pull: PathBuf,

    /// How to bring in the base branch
    #[arg(long, value_enum, default_value_t = StrategyArg::Merge)]
    strategy: StrategyArg,
}

pub fn run(args: &SyncArgs, config: &Config) -> Result<i32> {
    let pr = load_pull_request(&args.pull, config)?;
    let synchronizer = Synchronizer::new(config.context(), config.sync);

    match synchronizer.synchronize(&pr, args.strategy.into()) {
        Ok(SyncOutcome::UpToDate { head }) => {
            println!("up-to-date {head}");
            Ok(0)
        }
        Ok(SyncOutcome::Updated { head, forced }) => {
            let suffix = if forced { " (forced)" } else { "" };
            println!("updated {head}{suffix}");
            Ok(0)
        }
        Err(err) if err.kind() == Some(ErrorKind::Conflict) => {
            eprintln!("conflict: {err}");
            Ok(1)
        }
        Err(err) => Err(err.into()),
    }
}
