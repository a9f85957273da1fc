use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use mergebot_ops::{DuplicateFailure, Duplicator, TargetOutcome};

use super::load_pull_request;
use crate::config::Config;

#[derive(Args)]
pub struct DuplicateArgs {
    /// Pull request file (YAML)
    #[arg(long)]
    pull: PathBuf,

    /// Branch to copy the pull request onto (repeatable or comma separated)
    #[arg(long = "target", value_delimiter = ',', required = true)]
    targets: Vec<String>,
}

fn failure_label(reason: &DuplicateFailure) -> &'static str {
    match reason {
        DuplicateFailure::Resolution(_) => "resolution",
        DuplicateFailure::Token(_) => "token",
        DuplicateFailure::Git { kind, .. } => kind.as_str(),
    }
}

/// Prints one line per target: `created <target> <branch>` or
/// `failed <target> <kind>: <reason>`. Exits 1 if any target failed.
pub fn run(args: &DuplicateArgs, config: &Config) -> Result<i32> {
    let pr = load_pull_request(&args.pull, config)?;
    let duplicator = Duplicator::new(config.context(), config.duplicate.clone());
    let report = duplicator.duplicate(&pr, &args.targets)?;

    for target in &report.targets {
        match &target.outcome {
            TargetOutcome::Created { branch } => println!("created {} {branch}", target.target),
            TargetOutcome::Failed { reason } => println!(
                "failed {} {}: {reason}",
                target.target,
                failure_label(reason)
            ),
        }
    }
    Ok(if report.all_created() { 0 } else { 1 })
}
