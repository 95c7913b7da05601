//! Differential membership change sets.
//!
//! A [`ChangeMap`] records, per account, how one tier's membership changed
//! over some span of events. Maps produced by successive events are merged
//! by composing the per-account transitions:
//!
//! - `Add` then `Delete` cancel out.
//! - `Add` then `Modify` stays an `Add` carrying the latest payload.
//! - `Delete` then `Add` becomes a `Modify`.
//! - `Modify` then `Modify` keeps the latest payload; `Modify` then `Delete`
//!   is a `Delete`.
//!
//! Every other sequence is impossible for a single account and is rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{AccountName, ProducerPayload, TypesError};

/// One account's net membership change within a tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRecord {
    /// Absent before, present after.
    Add(ProducerPayload),
    /// Present before and after, with a new payload.
    Modify(ProducerPayload),
    /// Present before, absent after.
    Delete,
}

impl ChangeRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Modify(_) => "modify",
            Self::Delete => "delete",
        }
    }

    /// Compose `self` followed by `later`. `Ok(None)` means the two cancel.
    pub fn then(self, later: ChangeRecord, id: &AccountName) -> Result<Option<Self>, TypesError> {
        use ChangeRecord::*;
        match (self, later) {
            (Add(_), Delete) => Ok(None),
            (Add(_), Modify(p)) => Ok(Some(Add(p))),
            (Delete, Add(p)) => Ok(Some(Modify(p))),
            (Modify(_), Modify(p)) => Ok(Some(Modify(p))),
            (Modify(_), Delete) => Ok(Some(Delete)),
            (earlier, later) => Err(TypesError::ImpossibleTransition {
                id: id.to_string(),
                earlier: earlier.kind(),
                later: later.kind(),
            }),
        }
    }
}

/// A tier's differential change set plus its size after the changes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMap {
    pub entries: BTreeMap<AccountName, ChangeRecord>,
    pub resulting_size: u32,
    /// The entries describe the complete membership, not a diff.
    pub replace_all: bool,
}

impl ChangeMap {
    pub fn new(resulting_size: u32) -> Self {
        Self {
            resulting_size,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record a change for `id`, composing with any earlier record.
    pub fn record(&mut self, id: AccountName, change: ChangeRecord) -> Result<(), TypesError> {
        match self.entries.remove(&id) {
            None => {
                self.entries.insert(id, change);
            }
            Some(earlier) => {
                if let Some(merged) = earlier.then(change, &id)? {
                    self.entries.insert(id, merged);
                }
            }
        }
        Ok(())
    }

    /// Fold a later map into this one.
    pub fn merge(&mut self, later: &ChangeMap) -> Result<(), TypesError> {
        if later.replace_all {
            *self = later.clone();
            return Ok(());
        }
        for (id, change) in &later.entries {
            self.record(id.clone(), change.clone())?;
        }
        self.resulting_size = later.resulting_size;
        Ok(())
    }

    /// Apply to a membership snapshot, failing on a change the snapshot
    /// cannot accept (adding a present member, removing an absent one).
    pub fn apply_to(
        &self,
        members: &mut BTreeMap<AccountName, ProducerPayload>,
    ) -> Result<(), TypesError> {
        if self.replace_all {
            members.clear();
        }
        for (id, change) in &self.entries {
            let present = members.contains_key(id);
            match (change, present) {
                (ChangeRecord::Add(p), false) | (ChangeRecord::Modify(p), true) => {
                    members.insert(id.clone(), p.clone());
                }
                (ChangeRecord::Delete, true) => {
                    members.remove(id);
                }
                (change, present) => {
                    return Err(TypesError::ImpossibleTransition {
                        id: id.to_string(),
                        earlier: if present { "present" } else { "absent" },
                        later: change.kind(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Changes to both tiers produced by one event or merged from several.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedChanges {
    pub main: ChangeMap,
    pub backup: ChangeMap,
}

impl ProposedChanges {
    pub fn new(main_size: u32, backup_size: u32) -> Self {
        Self {
            main: ChangeMap::new(main_size),
            backup: ChangeMap::new(backup_size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.backup.is_empty()
    }

    /// Total number of per-account records across both tiers.
    pub fn len(&self) -> usize {
        self.main.len() + self.backup.len()
    }

    pub fn merge(&mut self, later: &ProposedChanges) -> Result<(), TypesError> {
        self.main.merge(&later.main)?;
        self.backup.merge(&later.backup)
    }
}

/// One appended batch of changes, consumed oldest-first by flush.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: u64,
    pub changes: ProposedChanges,
}
