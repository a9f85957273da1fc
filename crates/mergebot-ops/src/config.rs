use mergebot_git::MergeStrategy;
use serde::Deserialize;

/// History depth used by [`Synchronizer`](crate::Synchronizer) fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Depth of the first shallow fetch. Zero fetches full history.
    pub initial_depth: u32,
    /// Past this depth the remaining history is fetched in full.
    pub max_depth: u32,
    /// Strategy for the merge flavour of synchronization.
    pub merge_strategy: MergeStrategy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_depth: 50,
            max_depth: 1600,
            merge_strategy: MergeStrategy::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DuplicateConfig {
    /// New branches are named `<prefix>/<target>/pr-<number>`.
    pub branch_prefix: String,
    /// Targets processed at the same time.
    pub max_parallel: usize,
    /// Word used in titles of follow-up pull requests, e.g. "backport".
    pub label: String,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            branch_prefix: "mergebot/bp".to_string(),
            max_parallel: 4,
            label: "backport".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: DuplicateConfig = serde_yaml::from_str("label: copy").unwrap();
        assert_eq!(config.label, "copy");
        assert_eq!(config.branch_prefix, "mergebot/bp");
        assert_eq!(config.max_parallel, 4);

        let sync: SyncConfig = serde_yaml::from_str("initial_depth: 10").unwrap();
        assert_eq!(sync.initial_depth, 10);
        assert_eq!(sync.max_depth, 1600);
        assert_eq!(sync.merge_strategy, MergeStrategy::Default);
    }

    #[test]
    fn merge_strategy_by_name() {
        let sync: SyncConfig = serde_yaml::from_str("merge_strategy: resolve").unwrap();
        assert_eq!(sync.merge_strategy, MergeStrategy::Resolve);
        let sync: SyncConfig = serde_yaml::from_str("merge_strategy: ort").unwrap();
        assert_eq!(sync.merge_strategy, MergeStrategy::Ort);
        assert!(serde_yaml::from_str::<SyncConfig>("merge_strategy: octopus").is_err());
    }
}
