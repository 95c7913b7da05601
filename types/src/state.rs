//! Process-wide election state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ElectedQueue, RankKey};

/// The two elected tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Main,
    Backup,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Backup => "backup",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Both tiers plus their capacities. Persisted as a single record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionState {
    pub main: ElectedQueue,
    pub backup: ElectedQueue,
    /// Fixed main-tier capacity.
    pub max_main: u32,
    /// Backup-tier ceiling.
    pub max_backup: u32,
    /// Backup-tier floor.
    pub min_backup: u32,
    /// Id of the last change-log entry appended.
    pub last_change_id: u64,
}

impl ElectionState {
    pub fn queue(&self, tier: Tier) -> &ElectedQueue {
        match tier {
            Tier::Main => &self.main,
            Tier::Backup => &self.backup,
        }
    }

    /// Which tier an entry with `key` belongs to under the current markers.
    pub fn tier_of(&self, key: &RankKey) -> Option<Tier> {
        if self.main.covers(key) {
            Some(Tier::Main)
        } else if self.backup.covers(key) {
            Some(Tier::Backup)
        } else {
            None
        }
    }
}
