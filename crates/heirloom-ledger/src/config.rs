//! Ledger configuration.

use serde::{Deserialize, Serialize};

/// Default actor recorded when a request names none.
pub const DEFAULT_ACTOR: &str = "system";

/// Default number of inactive versions kept per triple.
pub const DEFAULT_MAX_VERSIONS: usize = 10;

/// Behaviour knobs for a [`crate::Ledger`], passed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Inactive versions kept per triple after a release. `0` disables pruning.
    pub max_versions: usize,
    /// Recorded as `deployed_by` when a request leaves it empty.
    pub default_actor: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_versions: DEFAULT_MAX_VERSIONS,
            default_actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.max_versions, 10);
        assert_eq!(cfg.default_actor, "system");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: LedgerConfig = toml::from_str("max_versions = 3").unwrap();
        assert_eq!(cfg.max_versions, 3);
        assert_eq!(cfg.default_actor, "system");
    }
}
