//! Election configuration with TOML support.

use serde::{Deserialize, Serialize};

use crate::ElectionError;

/// Tunables for election and change-log flushing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Backup-tier floor.
    #[serde(default = "default_min_backup")]
    pub min_backup: u32,

    /// Main-tier capacity used when bootstrap does not name one.
    #[serde(default = "default_max_main")]
    pub default_max_main: u32,

    /// Backup-tier ceiling used when bootstrap does not name one.
    #[serde(default = "default_max_backup")]
    pub default_max_backup: u32,

    /// Stop merging log entries once the merged diff holds this many records.
    #[serde(default = "default_flush_entry_threshold")]
    pub flush_entry_threshold: usize,

    /// Merge at most this many log entries per flush.
    #[serde(default = "default_flush_row_cap")]
    pub flush_row_cap: usize,

    /// Largest number of score updates accepted in one batch.
    #[serde(default = "default_max_batch_updates")]
    pub max_batch_updates: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_min_backup() -> u32 {
    3
}

fn default_max_main() -> u32 {
    21
}

fn default_max_backup() -> u32 {
    43
}

fn default_flush_entry_threshold() -> usize {
    300
}

fn default_flush_row_cap() -> usize {
    10
}

fn default_max_batch_updates() -> usize {
    30
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ElectionConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ElectionError> {
        let config: Self = toml::from_str(s).map_err(|e| ElectionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ElectionError> {
        if self.min_backup == 0 {
            return Err(ElectionError::Config("min_backup must be at least 1".into()));
        }
        if self.default_max_main == 0 || self.default_max_backup < self.min_backup {
            return Err(ElectionError::Config(format!(
                "default capacities {}/{} are invalid with min_backup {}",
                self.default_max_main, self.default_max_backup, self.min_backup
            )));
        }
        if self.flush_entry_threshold == 0 || self.flush_row_cap == 0 {
            return Err(ElectionError::Config(
                "flush_entry_threshold and flush_row_cap must be positive".into(),
            ));
        }
        if self.max_batch_updates == 0 {
            return Err(ElectionError::Config("max_batch_updates must be positive".into()));
        }
        Ok(())
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            min_backup: default_min_backup(),
            default_max_main: default_max_main(),
            default_max_backup: default_max_backup(),
            flush_entry_threshold: default_flush_entry_threshold(),
            flush_row_cap: default_flush_row_cap(),
            max_batch_updates: default_max_batch_updates(),
        }
    }
}
