use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use mergebot_git::{ExecutorConfig, Identity, Secret};
use mergebot_ops::{DuplicateConfig, GitContext, RepoRef, StaticTokens, SyncConfig};
use serde::Deserialize;

/// Top-level configuration. Every section is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub identity: Identity,
    pub host: HostConfig,
    pub executor: ExecutorConfig,
    pub sync: SyncConfig,
    pub duplicate: DuplicateConfig,
    /// Environment variable the access token is read from.
    pub token_env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Forge domain used to build clone URLs that a pull request file omits.
    pub domain: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            domain: "github.com".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identity: Identity::default(),
            host: HostConfig::default(),
            executor: ExecutorConfig::default(),
            sync: SyncConfig::default(),
            duplicate: DuplicateConfig::default(),
            token_env: "MERGEBOT_TOKEN".to_string(),
        }
    }
}

impl Config {
    /// Tokens for every repository, taken from `token_env` when it is set.
    pub fn tokens(&self) -> StaticTokens {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.is_empty() => StaticTokens::for_all(Secret::new(token)),
            _ => StaticTokens::new(),
        }
    }

    pub fn context(&self) -> GitContext {
        GitContext::new(
            self.executor.clone(),
            self.identity.clone(),
            Arc::new(self.tokens()),
        )
    }

    /// Give `repo` an https clone URL on the configured domain if it has none.
    pub fn fill_clone_url(&self, repo: &mut RepoRef) {
        if repo.clone_url.is_empty() {
            repo.clone_url = format!("https://{}/{}.git", self.host.domain, repo.full_name);
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(
        config.executor.command_timeout_secs > 0,
        "executor.command_timeout_secs must be positive"
    );
    anyhow::ensure!(
        config.duplicate.max_parallel > 0,
        "duplicate.max_parallel must be at least 1"
    );
    anyhow::ensure!(
        config.sync.initial_depth <= config.sync.max_depth,
        "sync.initial_depth must not exceed sync.max_depth"
    );
    anyhow::ensure!(
        !config.duplicate.branch_prefix.trim_matches('/').is_empty(),
        "duplicate.branch_prefix must not be empty"
    );
    anyhow::ensure!(!config.token_env.is_empty(), "token_env must not be empty");
    Ok(())
}
