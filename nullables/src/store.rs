//! Nullable store: thread-safe in-memory election storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use elector_store::{
    ChangeLogStore, ElectionStateStore, ElectorStore, ProducerStore, StoreBatch, StoreError,
};
use elector_types::{
    AccountName, ChangeLogEntry, Direction, ElectionState, ProducerInfo, ProposedChanges, RankKey,
};

#[derive(Default)]
struct Inner {
    by_name: HashMap<AccountName, ProducerInfo>,
    by_rank: BTreeMap<RankKey, AccountName>,
    state: Option<ElectionState>,
    log: BTreeMap<u64, ProposedChanges>,
}

impl Inner {
    fn put_producer(&mut self, info: ProducerInfo) {
        if let Some(old) = self.by_name.get(&info.name) {
            self.by_rank.remove(&old.rank_key());
        }
        self.by_rank.insert(info.rank_key(), info.name.clone());
        self.by_name.insert(info.name.clone(), info);
    }

    fn resolve(&self, name: &AccountName) -> Result<ProducerInfo, StoreError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::Corruption(format!("rank row without producer {name}")))
    }
}

/// An in-memory producer index, election state and change log.
///
/// Counts neighbour lookups so tests can assert the engine stays bounded.
pub struct NullElectorStore {
    inner: Mutex<Inner>,
    neighbor_lookups: AtomicU64,
    fail_commits: AtomicBool,
}

impl NullElectorStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            neighbor_lookups: AtomicU64::new(0),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Insert or replace a producer directly, bypassing election.
    pub fn seed_producer(&self, info: ProducerInfo) {
        self.inner.lock().unwrap().put_producer(info);
    }

    /// Number of `rank_neighbor` calls served so far.
    pub fn neighbor_lookups(&self) -> u64 {
        self.neighbor_lookups.load(Ordering::Relaxed)
    }

    /// Make every subsequent commit fail with a backend error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::Relaxed);
    }

    /// Every producer in rank order.
    pub fn all_ranked(&self) -> Vec<ProducerInfo> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_rank
            .values()
            .filter_map(|name| inner.by_name.get(name).cloned())
            .collect()
    }
}

impl Default for NullElectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProducerStore for NullElectorStore {
    fn get_producer(&self, name: &AccountName) -> Result<Option<ProducerInfo>, StoreError> {
        Ok(self.inner.lock().unwrap().by_name.get(name).cloned())
    }

    fn rank_neighbor(
        &self,
        key: &RankKey,
        direction: Direction,
    ) -> Result<Option<ProducerInfo>, StoreError> {
        self.neighbor_lookups.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.lock().unwrap();
        let found = match direction {
            Direction::Down => inner
                .by_rank
                .range((Bound::Excluded(key), Bound::Unbounded))
                .next(),
            Direction::Up => inner
                .by_rank
                .range((Bound::Unbounded, Bound::Excluded(key)))
                .next_back(),
        };
        found.map(|(_, name)| inner.resolve(name)).transpose()
    }

    fn iter_ranked(
        &self,
        after: Option<&RankKey>,
        limit: usize,
    ) -> Result<Vec<ProducerInfo>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        inner
            .by_rank
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(_, name)| inner.resolve(name))
            .collect()
    }

    fn producer_count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().unwrap().by_name.len() as u64)
    }
}

impl ElectionStateStore for NullElectorStore {
    fn get_election_state(&self) -> Result<Option<ElectionState>, StoreError> {
        Ok(self.inner.lock().unwrap().state.clone())
    }
}

impl ChangeLogStore for NullElectorStore {
    fn first_log_entries(&self, limit: usize) -> Result<Vec<ChangeLogEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .log
            .iter()
            .take(limit)
            .map(|(&id, changes)| ChangeLogEntry {
                id,
                changes: changes.clone(),
            })
            .collect())
    }

    fn log_len(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().unwrap().log.len() as u64)
    }
}

impl ElectorStore for NullElectorStore {
    fn commit(&self, batch: StoreBatch) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("commit disabled".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        for entry in &batch.append {
            if inner.log.contains_key(&entry.id) {
                return Err(StoreError::Duplicate(format!("change log entry {}", entry.id)));
            }
        }
        for id in &batch.consume {
            let appended = batch.append.iter().any(|e| e.id == *id);
            if !appended && !inner.log.contains_key(id) {
                return Err(StoreError::NotFound(format!("change log entry {id}")));
            }
        }
        for info in batch.producers {
            inner.put_producer(info);
        }
        if let Some(state) = batch.state {
            inner.state = Some(state);
        }
        for entry in batch.append {
            inner.log.insert(entry.id, entry.changes);
        }
        for id in batch.consume {
            inner.log.remove(&id);
        }
        Ok(())
    }
}
