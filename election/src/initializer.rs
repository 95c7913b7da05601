//! One-time bootstrap of both tiers from the sorted index.

use elector_store::ProducerStore;
use elector_types::{
    BoundarySnapshot, ChangeRecord, ElectedQueue, ElectionState, ProducerInfo, ProposedChanges,
};
use tracing::info;

use crate::ElectionError;

/// Tier capacities requested at bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capacities {
    pub max_main: u32,
    pub max_backup: u32,
    pub min_backup: u32,
}

impl Capacities {
    pub fn validate(&self) -> Result<(), ElectionError> {
        if self.max_main == 0 {
            return Err(ElectionError::InvalidCapacity("max_main must be at least 1".into()));
        }
        if self.min_backup == 0 || self.max_backup < self.min_backup {
            return Err(ElectionError::InvalidCapacity(format!(
                "max_backup {} must be at least min_backup {} (and min_backup at least 1)",
                self.max_backup, self.min_backup
            )));
        }
        Ok(())
    }

    /// Eligible producers required before bootstrap may run.
    pub fn required_candidates(&self) -> u64 {
        u64::from(self.max_main) + u64::from(self.min_backup) + 1
    }
}

/// Scan the top of the index and build both tiers.
///
/// Returns the seeded state (with `last_change_id = 0`) and the full
/// membership as `replace_all` change maps.
pub fn initelects<S: ProducerStore>(
    index: &S,
    caps: Capacities,
) -> Result<(ElectionState, ProposedChanges), ElectionError> {
    caps.validate()?;
    let main_len = caps.max_main as usize;
    let scan = main_len + caps.max_backup.max(caps.min_backup + 1) as usize + 1;
    let ranked = index.iter_ranked(None, scan)?;

    // Eligible producers form a prefix of the rank order.
    let eligible = ranked.iter().take_while(|p| p.is_eligible()).count();
    let need = caps.required_candidates();
    if (eligible as u64) < need {
        return Err(ElectionError::InsufficientCandidates {
            have: eligible as u64,
            need,
        });
    }

    let backup_len = (eligible - main_len)
        .clamp(caps.min_backup as usize, caps.max_backup as usize)
        .min(ranked.len() - main_len);

    let main = &ranked[..main_len];
    let backup = &ranked[main_len..main_len + backup_len];

    let state = ElectionState {
        main: ElectedQueue {
            size: caps.max_main,
            boundary: snapshot_at(&ranked, main_len),
        },
        backup: ElectedQueue {
            size: backup_len as u32,
            boundary: snapshot_at(&ranked, main_len + backup_len),
        },
        max_main: caps.max_main,
        max_backup: caps.max_backup,
        min_backup: caps.min_backup,
        last_change_id: 0,
    };

    let mut changes = ProposedChanges::new(state.main.size, state.backup.size);
    changes.main.replace_all = true;
    changes.backup.replace_all = true;
    for p in main {
        changes
            .main
            .record(p.name.clone(), ChangeRecord::Add(p.payload.clone()))?;
    }
    for p in backup {
        changes
            .backup
            .record(p.name.clone(), ChangeRecord::Add(p.payload.clone()))?;
    }

    info!(
        main = state.main.size,
        backup = state.backup.size,
        eligible_seen = eligible,
        "initialized elected producer tiers"
    );
    Ok((state, changes))
}

/// Markers around a cut placed after the first `len` entries.
fn snapshot_at(ranked: &[ProducerInfo], len: usize) -> BoundarySnapshot {
    BoundarySnapshot {
        tail_prev: len.checked_sub(2).and_then(|i| ranked.get(i)).cloned(),
        tail: len.checked_sub(1).and_then(|i| ranked.get(i)).cloned(),
        tail_next: ranked.get(len).cloned(),
    }
}
