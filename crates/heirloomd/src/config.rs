//! heirloomd configuration: TOML file plus command-line overrides.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use heirloom_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

/// Name of the database file inside the data directory.
pub const DB_FILE: &str = "heirloom.redb";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Verbose default filter when `RUST_LOG` is unset.
    pub debug: bool,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Flags of `heirloomd serve`. Each one overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Data directory for the ledger database.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Inactive versions kept per target (0 disables pruning).
    #[arg(long)]
    pub max_versions: Option<usize>,

    /// Actor recorded when a request names none.
    #[arg(long)]
    pub default_actor: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    pub debug: bool,

    /// Log output format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file named by `args` (if any) and apply the flag overrides.
    pub fn load(args: &ServeArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(args);
        Ok(config)
    }

    pub fn apply(&mut self, args: &ServeArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(dir) = &args.data_dir {
            self.storage.data_dir = dir.clone();
        }
        if let Some(max) = args.max_versions {
            self.ledger.max_versions = max;
        }
        if let Some(actor) = &args.default_actor {
            self.ledger.default_actor = actor.clone();
        }
        if args.debug {
            self.log.debug = true;
        }
        if let Some(format) = args.log_format {
            self.log.format = format;
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join(DB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.db_path(), PathBuf::from("./data/heirloom.redb"));
        assert_eq!(cfg.ledger.max_versions, 10);
        assert_eq!(cfg.ledger.default_actor, "system");
        assert!(!cfg.log.debug);
        assert_eq!(cfg.log.format, LogFormat::Text);
    }

    #[test]
    fn parse_partial_toml() {
        let toml = r#"
[server]
port = 9000

[ledger]
max_versions = 3

[log]
format = "json"
"#;
        let cfg: DaemonConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.ledger.max_versions, 3);
        assert_eq!(cfg.ledger.default_actor, "system");
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.storage, StorageConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heirloom.toml");
        std::fs::write(&path, "[server]\nport = 9000\n[storage]\ndata_dir = \"/srv/ledger\"\n")
            .unwrap();

        let args = ServeArgs {
            config: Some(path),
            port: Some(7000),
            max_versions: Some(0),
            default_actor: Some("deploy-bot".to_string()),
            debug: true,
            ..Default::default()
        };
        let cfg = DaemonConfig::load(&args).unwrap();
        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/srv/ledger"));
        assert_eq!(cfg.ledger.max_versions, 0);
        assert_eq!(cfg.ledger.default_actor, "deploy-bot");
        assert!(cfg.log.debug);
    }

    #[test]
    fn missing_file_is_error() {
        let args = ServeArgs {
            config: Some(PathBuf::from("/nonexistent/heirloom.toml")),
            ..Default::default()
        };
        assert!(DaemonConfig::load(&args).is_err());
    }

    #[test]
    fn unknown_log_format_rejected() {
        let result: Result<DaemonConfig, _> = toml::from_str("[log]\nformat = \"xml\"\n");
        assert!(result.is_err());
    }
}
