//! Change log flushing: merge queued diffs oldest-first into one bounded
//! diff for the scheduler.

use elector_store::ChangeLogStore;
use elector_types::ProposedChanges;

use crate::ElectionError;

/// Bounds on how much one flush may merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlushLimits {
    /// Stop once the merged diff holds at least this many records.
    pub entry_threshold: usize,
    /// Merge at most this many log entries.
    pub row_cap: usize,
}

/// The merged head of the change log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergedBatch {
    pub changes: ProposedChanges,
    /// Ids of the log entries folded into `changes`, ascending.
    pub consumed: Vec<u64>,
}

impl MergedBatch {
    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}

/// Merge log entries oldest-first until either limit is reached.
pub fn merge_pending<S: ChangeLogStore>(
    log: &S,
    limits: FlushLimits,
) -> Result<MergedBatch, ElectionError> {
    let mut batch = MergedBatch::default();
    for entry in log.first_log_entries(limits.row_cap)? {
        if batch.consumed.is_empty() {
            batch.changes = entry.changes;
        } else {
            batch.changes.merge(&entry.changes)?;
        }
        batch.consumed.push(entry.id);
        if batch.changes.len() >= limits.entry_threshold {
            break;
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use elector_nullables::NullElectorStore;
    use elector_store::{ElectorStore, StoreBatch};
    use elector_types::{AccountName, ChangeLogEntry, ChangeRecord, ProducerPayload};

    fn entry(id: u64, records: &[(&str, ChangeRecord)]) -> ChangeLogEntry {
        let mut changes = ProposedChanges::new(21, 43);
        for (name, record) in records {
            changes
                .main
                .record(AccountName::new(*name).unwrap(), record.clone())
                .unwrap();
        }
        ChangeLogEntry { id, changes }
    }

    fn add() -> ChangeRecord {
        ChangeRecord::Add(ProducerPayload::default())
    }

    fn limits(entry_threshold: usize, row_cap: usize) -> FlushLimits {
        FlushLimits {
            entry_threshold,
            row_cap,
        }
    }

    fn store_with(entries: Vec<ChangeLogEntry>) -> NullElectorStore {
        let store = NullElectorStore::new();
        store
            .commit(StoreBatch {
                append: entries,
                ..Default::default()
            })
            .unwrap();
        store
    }

    #[test]
    fn empty_log_merges_nothing() {
        let store = NullElectorStore::new();
        assert!(merge_pending(&store, limits(300, 10)).unwrap().is_empty());
    }

    #[test]
    fn row_cap_bounds_the_merge() {
        let store = store_with(
            (1..=5)
                .map(|i| entry(i, &[(format!("bp{i}").as_str(), add())]))
                .collect(),
        );
        let batch = merge_pending(&store, limits(300, 3)).unwrap();
        assert_eq!(batch.consumed, vec![1, 2, 3]);
        assert_eq!(batch.changes.main.len(), 3);
    }

    #[test]
    fn entry_threshold_stops_early() {
        let store = store_with(vec![
            entry(1, &[("a", add()), ("b", add())]),
            entry(2, &[("c", add())]),
            entry(3, &[("d", add())]),
        ]);
        let batch = merge_pending(&store, limits(3, 10)).unwrap();
        assert_eq!(batch.consumed, vec![1, 2]);
    }

    #[test]
    fn cancelling_entries_merge_to_empty_diff() {
        let store = store_with(vec![
            entry(1, &[("a", add())]),
            entry(2, &[("a", ChangeRecord::Delete)]),
        ]);
        let batch = merge_pending(&store, limits(300, 10)).unwrap();
        assert_eq!(batch.consumed, vec![1, 2]);
        assert!(batch.changes.is_empty());
    }

    #[test]
    fn impossible_sequence_fails_the_merge() {
        let store = store_with(vec![entry(1, &[("a", add())]), entry(2, &[("a", add())])]);
        assert!(matches!(
            merge_pending(&store, limits(300, 10)),
            Err(ElectionError::ChangeMerge(_))
        ));
    }
}
