//! Daemon configuration with TOML file support.

use std::path::{Path, PathBuf};

use anyhow::Context;
use elector_election::ElectionConfig;
use elector_utils::LogFormat;
use serde::{Deserialize, Serialize};

/// Configuration for the elector daemon.
///
/// Loaded from a TOML file via [`DaemonConfig::from_toml_file`]; CLI flags
/// and environment variables override individual fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// LMDB data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds between automatic flushes in `run` mode.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Accounts allowed to call administrative operations.
    #[serde(default)]
    pub admin_accounts: Vec<String>,

    /// Where forwarded schedule diffs are written; stdout when unset.
    #[serde(default)]
    pub schedule_output: Option<PathBuf>,

    #[serde(default)]
    pub election: ElectionConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./elector_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_flush_interval_secs() -> u64 {
    5
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            flush_interval_secs: default_flush_interval_secs(),
            admin_accounts: Vec::new(),
            schedule_output: None,
            election: ElectionConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("invalid daemon config")?;
        config.election.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(DaemonConfig::from_toml_str("").unwrap(), DaemonConfig::default());
    }

    #[test]
    fn election_table_is_nested() {
        let config = DaemonConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/elector"
            log_format = "json"
            admin_accounts = ["eosio"]

            [election]
            min_backup = 5
            flush_row_cap = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/elector"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.admin_accounts, vec!["eosio".to_string()]);
        assert_eq!(config.election.min_backup, 5);
        assert_eq!(config.election.flush_row_cap, 20);
        assert_eq!(config.election.default_max_main, 21);
    }

    #[test]
    fn invalid_election_table_is_rejected() {
        let err = DaemonConfig::from_toml_str("[election]\nmin_backup = 50\ndefault_max_backup = 10\n");
        assert!(err.is_err());
    }
}
