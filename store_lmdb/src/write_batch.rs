//! Write batching: groups producer writes, the election state and change
//! log appends/consumes into a single LMDB write transaction.
//!
//! # Usage
//!
//! ```ignore
//! let mut batch = env.write_batch()?;
//! batch.put_producer(&info)?;
//! batch.put_election_state(&state)?;
//! batch.append_log(&entry)?;
//! batch.commit()?;
//! ```
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use elector_store::{ElectorStore, StoreBatch, StoreError};
use elector_types::{ChangeLogEntry, ElectionState, ProducerInfo};

use crate::change_log::log_key;
use crate::election::ELECTION_STATE_KEY;
use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, LmdbError> {
        let txn = env.env.write_txn()?;
        Ok(Self { txn, env })
    }

    // ── Producer operations ─────────────────────────────────────────────

    /// Insert or replace a producer, moving its rank row if the key changed.
    pub fn put_producer(&mut self, info: &ProducerInfo) -> Result<(), LmdbError> {
        let new_rank = info.rank_key().to_bytes();
        if let Some(old) = self.env.producer_in(&self.txn, &info.name)? {
            let old_rank = old.rank_key().to_bytes();
            if old_rank != new_rank {
                self.env.ranks_db.delete(&mut self.txn, &old_rank)?;
            }
        }
        let bytes = bincode::serialize(info)?;
        self.env
            .producers_db
            .put(&mut self.txn, info.name.as_bytes(), &bytes)?;
        self.env.ranks_db.put(&mut self.txn, &new_rank, &bytes)?;
        Ok(())
    }

    // ── Election state ──────────────────────────────────────────────────

    pub fn put_election_state(&mut self, state: &ElectionState) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(state)?;
        self.env
            .meta_db
            .put(&mut self.txn, ELECTION_STATE_KEY, &bytes)?;
        Ok(())
    }

    // ── Change log ──────────────────────────────────────────────────────

    /// Append a change log entry. Ids must be fresh.
    pub fn append_log(&mut self, entry: &ChangeLogEntry) -> Result<(), LmdbError> {
        let key = log_key(entry.id);
        if self.env.change_log_db.get(&self.txn, &key)?.is_some() {
            return Err(LmdbError::Corruption(format!(
                "change log entry {} already exists",
                entry.id
            )));
        }
        let bytes = bincode::serialize(&entry.changes)?;
        self.env.change_log_db.put(&mut self.txn, &key, &bytes)?;
        Ok(())
    }

    /// Remove a flushed change log entry.
    pub fn consume_log(&mut self, id: u64) -> Result<(), LmdbError> {
        if !self.env.change_log_db.delete(&mut self.txn, &log_key(id))? {
            return Err(LmdbError::NotFound(format!("change log entry {id}")));
        }
        Ok(())
    }

    // ── Meta ────────────────────────────────────────────────────────────

    pub fn put_meta(&mut self, key: &str, value: &[u8]) -> Result<(), LmdbError> {
        self.env
            .meta_db
            .put(&mut self.txn, key.as_bytes(), value)?;
        Ok(())
    }

    /// Commit every operation in the batch atomically.
    pub fn commit(self) -> Result<(), LmdbError> {
        self.txn.commit()?;
        Ok(())
    }
}

impl ElectorStore for LmdbEnvironment {
    fn commit(&self, batch: StoreBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut wb = self.write_batch()?;
        for info in &batch.producers {
            wb.put_producer(info)?;
        }
        if let Some(state) = &batch.state {
            wb.put_election_state(state)?;
        }
        for entry in &batch.append {
            wb.append_log(entry)?;
        }
        for &id in &batch.consume {
            wb.consume_log(id)?;
        }
        wb.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elector_store::{ChangeLogStore, ElectionStateStore, ProducerStore};
    use elector_types::{AccountName, Direction, ProducerPayload, ProposedChanges, Score};

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 8, 16 * 1024 * 1024).expect("open env");
        (dir, env)
    }

    fn producer(name: &str, score: u128) -> ProducerInfo {
        ProducerInfo::new(
            AccountName::new(name).unwrap(),
            Score::new(score),
            ProducerPayload::default(),
        )
    }

    fn names(producers: Vec<ProducerInfo>) -> Vec<String> {
        producers.into_iter().map(|p| p.name.to_string()).collect()
    }

    #[test]
    fn producers_are_scanned_in_rank_order() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().expect("write_batch");
        for (name, score) in [("carol", 10), ("alice", 30), ("bob", 20), ("dave", 20)] {
            batch.put_producer(&producer(name, score)).expect("put_producer");
        }
        let mut idle = producer("erin", 99);
        idle.active = false;
        batch.put_producer(&idle).expect("put_producer");
        batch.commit().expect("commit");

        let ranked = env.iter_ranked(None, 10).expect("iter_ranked");
        assert_eq!(names(ranked), ["alice", "bob", "dave", "carol", "erin"]);
        assert_eq!(env.producer_count().unwrap(), 5);

        let after_bob = producer("bob", 20).rank_key();
        assert_eq!(names(env.iter_ranked(Some(&after_bob), 2).unwrap()), ["dave", "carol"]);
    }

    #[test]
    fn rescoring_moves_the_rank_row() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().unwrap();
        batch.put_producer(&producer("alice", 30)).unwrap();
        batch.put_producer(&producer("bob", 20)).unwrap();
        batch.commit().unwrap();

        let mut batch = env.write_batch().unwrap();
        batch.put_producer(&producer("bob", 40)).unwrap();
        batch.commit().unwrap();

        assert_eq!(names(env.iter_ranked(None, 10).unwrap()), ["bob", "alice"]);
        assert_eq!(
            env.get_producer(&AccountName::new("bob").unwrap())
                .unwrap()
                .unwrap()
                .score,
            Score::new(40)
        );
    }

    #[test]
    fn neighbors_of_present_and_absent_keys() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().unwrap();
        for (name, score) in [("a", 30), ("b", 20), ("c", 10)] {
            batch.put_producer(&producer(name, score)).unwrap();
        }
        batch.commit().unwrap();

        let b = producer("b", 20).rank_key();
        assert_eq!(env.rank_neighbor(&b, Direction::Up).unwrap().unwrap().name.as_str(), "a");
        assert_eq!(env.rank_neighbor(&b, Direction::Down).unwrap().unwrap().name.as_str(), "c");

        let gap = producer("x", 15).rank_key();
        assert_eq!(env.rank_neighbor(&gap, Direction::Up).unwrap().unwrap().name.as_str(), "b");
        let bottom = producer("c", 10).rank_key();
        assert!(env.rank_neighbor(&bottom, Direction::Down).unwrap().is_none());
    }

    #[test]
    fn commit_writes_everything_or_nothing() {
        let (_dir, env) = temp_env();
        let state = ElectionState {
            max_main: 21,
            last_change_id: 1,
            ..ElectionState::default()
        };
        env.commit(StoreBatch {
            producers: vec![producer("a", 5)],
            state: Some(state.clone()),
            append: vec![ChangeLogEntry {
                id: 1,
                changes: ProposedChanges::new(21, 3),
            }],
            consume: Vec::new(),
        })
        .expect("commit");
        assert_eq!(env.get_election_state().unwrap(), Some(state.clone()));
        assert_eq!(env.log_len().unwrap(), 1);

        // Consuming a missing entry aborts the whole batch.
        let err = env.commit(StoreBatch {
            producers: vec![producer("b", 7)],
            consume: vec![1, 99],
            ..StoreBatch::default()
        });
        assert!(matches!(err, Err(StoreError::NotFound(_))));
        assert!(env.get_producer(&AccountName::new("b").unwrap()).unwrap().is_none());
        assert_eq!(env.log_len().unwrap(), 1);

        // A duplicate id aborts too.
        let err = env.commit(StoreBatch {
            append: vec![ChangeLogEntry {
                id: 1,
                changes: ProposedChanges::new(21, 3),
            }],
            ..StoreBatch::default()
        });
        assert!(matches!(err, Err(StoreError::Corruption(_))));
    }

    #[test]
    fn log_entries_come_back_oldest_first() {
        let (_dir, env) = temp_env();
        let entries: Vec<_> = [3u64, 1, 256, 2]
            .into_iter()
            .map(|id| ChangeLogEntry {
                id,
                changes: ProposedChanges::new(id as u32, 0),
            })
            .collect();
        env.commit(StoreBatch {
            append: entries,
            ..StoreBatch::default()
        })
        .unwrap();

        let ids: Vec<_> = env.first_log_entries(3).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        let first = &env.first_log_entries(1).unwrap()[0];
        assert_eq!(first.changes.main.resulting_size, 1);

        env.commit(StoreBatch {
            consume: vec![1, 2],
            ..StoreBatch::default()
        })
        .unwrap();
        let ids: Vec<_> = env.first_log_entries(10).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(ids, [3, 256]);
    }

    #[test]
    fn dropped_batch_is_rolled_back() {
        let (_dir, env) = temp_env();
        {
            let mut batch = env.write_batch().unwrap();
            batch.put_producer(&producer("ghost", 1)).unwrap();
        }
        assert_eq!(env.producer_count().unwrap(), 0);
    }
}
