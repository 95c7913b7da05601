//! Staged index: buffers one event's producer writes in memory on top of
//! the persistent index.
//!
//! Reads see the staged writes. Nothing reaches storage until the owner
//! hands [`StagedIndex::into_writes`] to a commit; dropping the overlay
//! discards every staged write.

use std::collections::BTreeMap;
use std::ops::Bound;

use elector_store::{ProducerStore, StoreError};
use elector_types::{AccountName, Direction, ProducerInfo, RankKey};

pub struct StagedIndex<'a, S> {
    base: &'a S,
    writes: BTreeMap<AccountName, ProducerInfo>,
    ranks: BTreeMap<RankKey, AccountName>,
}

impl<'a, S: ProducerStore> StagedIndex<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
            ranks: BTreeMap::new(),
        }
    }

    /// Stage a producer record, replacing any earlier version.
    pub fn put(&mut self, info: ProducerInfo) {
        if let Some(previous) = self.writes.get(&info.name) {
            self.ranks.remove(&previous.rank_key());
        }
        self.ranks.insert(info.rank_key(), info.name.clone());
        self.writes.insert(info.name.clone(), info);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// The staged records, ready for a store commit.
    pub fn into_writes(self) -> Vec<ProducerInfo> {
        self.writes.into_values().collect()
    }

    fn staged_neighbor(&self, key: &RankKey, direction: Direction) -> Option<ProducerInfo> {
        let found = match direction {
            Direction::Down => self
                .ranks
                .range((Bound::Excluded(key), Bound::Unbounded))
                .next(),
            Direction::Up => self
                .ranks
                .range((Bound::Unbounded, Bound::Excluded(key)))
                .next_back(),
        };
        found.and_then(|(_, name)| self.writes.get(name).cloned())
    }
}

impl<S: ProducerStore> ProducerStore for StagedIndex<'_, S> {
    fn get_producer(&self, name: &AccountName) -> Result<Option<ProducerInfo>, StoreError> {
        match self.writes.get(name) {
            Some(info) => Ok(Some(info.clone())),
            None => self.base.get_producer(name),
        }
    }

    fn rank_neighbor(
        &self,
        key: &RankKey,
        direction: Direction,
    ) -> Result<Option<ProducerInfo>, StoreError> {
        // Base rows of staged producers sit at their pre-event keys; skip them.
        let mut cursor = key.clone();
        let from_base = loop {
            match self.base.rank_neighbor(&cursor, direction)? {
                Some(p) if self.writes.contains_key(&p.name) => cursor = p.rank_key(),
                other => break other,
            }
        };
        let from_staged = self.staged_neighbor(key, direction);

        Ok(match (from_base, from_staged) {
            (Some(a), Some(b)) => {
                let a_first = a.rank_key() < b.rank_key();
                match (direction, a_first) {
                    (Direction::Down, true) | (Direction::Up, false) => Some(a),
                    _ => Some(b),
                }
            }
            (a, b) => a.or(b),
        })
    }

    fn iter_ranked(
        &self,
        after: Option<&RankKey>,
        limit: usize,
    ) -> Result<Vec<ProducerInfo>, StoreError> {
        let mut merged: Vec<ProducerInfo> = self
            .base
            .iter_ranked(after, limit.saturating_add(self.writes.len()))?
            .into_iter()
            .filter(|p| !self.writes.contains_key(&p.name))
            .collect();
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        merged.extend(
            self.ranks
                .range((lower, Bound::Unbounded))
                .take(limit)
                .filter_map(|(_, name)| self.writes.get(name).cloned()),
        );
        merged.sort_by_cached_key(ProducerInfo::rank_key);
        merged.truncate(limit);
        Ok(merged)
    }

    fn producer_count(&self) -> Result<u64, StoreError> {
        let mut count = self.base.producer_count()?;
        for name in self.writes.keys() {
            if self.base.get_producer(name)?.is_none() {
                count += 1;
            }
        }
        Ok(count)
    }
}
