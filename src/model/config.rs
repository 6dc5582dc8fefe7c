use serde::{Deserialize, Serialize};

/// Configuration from checklist.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistConfig {
    #[serde(default)]
    pub list: ListConfig,
}

/// How checklist items are ordered in the flat view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortPolicy {
    /// Items stay where the user put them
    #[default]
    Manual,
    /// Unchecked parents first, checked parents sink to the bottom
    AutoSortByChecked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default)]
    pub sort: SortPolicy,
    /// Maximum number of undoable changes kept per session
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        ListConfig {
            sort: SortPolicy::Manual,
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ChecklistConfig = toml::from_str("").unwrap();
        assert_eq!(config.list.sort, SortPolicy::Manual);
        assert_eq!(config.list.history_limit, 500);
    }

    #[test]
    fn parses_sort_policy() {
        let config: ChecklistConfig =
            toml::from_str("[list]\nsort = \"auto-sort-by-checked\"\nhistory_limit = 20\n").unwrap();
        assert_eq!(config.list.sort, SortPolicy::AutoSortByChecked);
        assert_eq!(config.list.history_limit, 20);
    }
}
