//! A contiguous run of the rank order around one tier boundary.
//!
//! `entries` are consecutive producers in rank order and `cut` counts how
//! many of them sit inside the tier (at or above the boundary). The window
//! grows from the index one neighbour at a time, only when a step needs an
//! entry it does not hold.

use elector_store::ProducerStore;
use elector_types::{AccountName, BoundarySnapshot, Direction, ProducerInfo, RankKey, Tier};
use tracing::debug;

use crate::ElectionError;

/// Where a key falls relative to a window.
pub(crate) enum Placement {
    Above,
    Below,
    /// Insertion index among the entries.
    Inside(usize),
}

#[derive(Debug)]
pub(crate) struct Window {
    pub(crate) tier: Tier,
    pub(crate) entries: Vec<ProducerInfo>,
    pub(crate) cut: usize,
}

impl Window {
    pub(crate) fn from_snapshot(tier: Tier, snapshot: &BoundarySnapshot) -> Self {
        let mut entries = Vec::with_capacity(5);
        let mut cut = 0;
        for marker in [&snapshot.tail_prev, &snapshot.tail] {
            if let Some(p) = marker {
                entries.push(p.clone());
                cut += 1;
            }
        }
        if let Some(p) = &snapshot.tail_next {
            entries.push(p.clone());
        }
        Self { tier, entries, cut }
    }

    pub(crate) fn position(&self, name: &AccountName) -> Option<usize> {
        self.entries.iter().position(|p| &p.name == name)
    }

    /// Drop `name` from the window. Returns whether it sat inside the tier.
    pub(crate) fn remove(&mut self, name: &AccountName) -> Option<bool> {
        let i = self.position(name)?;
        self.entries.remove(i);
        let inside = i < self.cut;
        if inside {
            self.cut -= 1;
        }
        Some(inside)
    }

    pub(crate) fn locate(&self, key: &RankKey) -> Placement {
        match (self.entries.first(), self.entries.last()) {
            (Some(first), _) if *key < first.rank_key() => Placement::Above,
            (_, Some(last)) if *key > last.rank_key() => Placement::Below,
            _ => Placement::Inside(self.entries.partition_point(|p| p.rank_key() < *key)),
        }
    }

    /// Rebuild an empty window from the neighbours of `anchor`, skipping the
    /// producer currently being moved.
    pub(crate) fn seed_around<S: ProducerStore>(
        &mut self,
        index: &S,
        anchor: &RankKey,
        skip: &ProducerInfo,
    ) -> Result<(), ElectionError> {
        let up = neighbor_skipping(index, anchor, Direction::Up, skip)?;
        let down = neighbor_skipping(index, anchor, Direction::Down, skip)?;
        self.cut = usize::from(up.is_some());
        self.entries = up.into_iter().chain(down).collect();
        Ok(())
    }

    /// Fetch the producer ranked directly above the window.
    pub(crate) fn extend_up<S: ProducerStore>(&mut self, index: &S) -> Result<bool, ElectionError> {
        let Some(first) = self.entries.first() else {
            return Ok(false);
        };
        let anchor = first.rank_key();
        match fetch(index, &anchor, Direction::Up, self.tier)? {
            Some(p) => {
                self.entries.insert(0, p);
                self.cut += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Fetch the producer ranked directly below the window.
    pub(crate) fn extend_down<S: ProducerStore>(
        &mut self,
        index: &S,
    ) -> Result<bool, ElectionError> {
        let Some(last) = self.entries.last() else {
            return Ok(false);
        };
        let anchor = last.rank_key();
        match fetch(index, &anchor, Direction::Down, self.tier)? {
            Some(p) => {
                self.entries.push(p);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Admit the first producer below the boundary into the tier.
    pub(crate) fn step_down<S: ProducerStore>(&mut self, index: &S) -> Result<(), ElectionError> {
        if self.cut == self.entries.len() && !self.extend_down(index)? {
            return Err(ElectionError::invariant(
                self.tier,
                "tail_next",
                "no producer left below the boundary to admit",
            ));
        }
        self.cut += 1;
        Ok(())
    }

    /// Push the tier's last member out below the boundary.
    pub(crate) fn step_up<S: ProducerStore>(&mut self, index: &S) -> Result<(), ElectionError> {
        if self.cut == 0 && !self.extend_up(index)? {
            return Err(ElectionError::invariant(
                self.tier,
                "tail",
                "no member left above the boundary to evict",
            ));
        }
        self.cut -= 1;
        Ok(())
    }

    /// The first producer below the boundary, fetching it if needed.
    pub(crate) fn next<S: ProducerStore>(
        &mut self,
        index: &S,
    ) -> Result<Option<&ProducerInfo>, ElectionError> {
        if self.cut == self.entries.len() {
            self.extend_down(index)?;
        }
        Ok(self.entries.get(self.cut))
    }

    /// The tier's last member, fetching it if needed.
    pub(crate) fn tail<S: ProducerStore>(
        &mut self,
        index: &S,
    ) -> Result<Option<&ProducerInfo>, ElectionError> {
        if self.cut == 0 {
            self.extend_up(index)?;
        }
        Ok(self.cut.checked_sub(1).and_then(|i| self.entries.get(i)))
    }

    /// Collapse back to a `{tail_prev, tail, tail_next}` snapshot, refreshing
    /// whichever of the three the window does not already hold.
    pub(crate) fn into_snapshot<S: ProducerStore>(
        mut self,
        index: &S,
    ) -> Result<BoundarySnapshot, ElectionError> {
        while self.cut < 2 && self.extend_up(index)? {}
        if self.cut == self.entries.len() {
            self.extend_down(index)?;
        }
        if self.cut == 0 {
            return Err(ElectionError::invariant(self.tier, "tail", "tier has no members"));
        }
        let at = |i: Option<usize>| i.and_then(|i| self.entries.get(i)).cloned();
        Ok(BoundarySnapshot {
            tail_prev: at(self.cut.checked_sub(2)),
            tail: at(Some(self.cut - 1)),
            tail_next: at(Some(self.cut)),
        })
    }
}

/// Bounded single-row lookup. The row found must lie strictly beyond the
/// anchor in the requested direction.
fn fetch<S: ProducerStore>(
    index: &S,
    anchor: &RankKey,
    direction: Direction,
    tier: Tier,
) -> Result<Option<ProducerInfo>, ElectionError> {
    let found = index.rank_neighbor(anchor, direction)?;
    if let Some(p) = &found {
        let key = p.rank_key();
        let beyond = match direction {
            Direction::Up => key < *anchor,
            Direction::Down => key > *anchor,
        };
        if !beyond {
            return Err(ElectionError::MarkerMismatch {
                anchor: anchor.to_string(),
                direction,
                found: key.to_string(),
            });
        }
        debug!(%tier, ?direction, %anchor, found = %key, "refreshed boundary marker");
    }
    Ok(found)
}

fn neighbor_skipping<S: ProducerStore>(
    index: &S,
    anchor: &RankKey,
    direction: Direction,
    skip: &ProducerInfo,
) -> Result<Option<ProducerInfo>, ElectionError> {
    match index.rank_neighbor(anchor, direction)? {
        Some(p) if p.name == skip.name => Ok(index.rank_neighbor(&p.rank_key(), direction)?),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elector_nullables::NullElectorStore;
    use elector_types::{ProducerPayload, Score};

    fn producer(name: &str, score: u128) -> ProducerInfo {
        ProducerInfo::new(
            AccountName::new(name).unwrap(),
            Score::new(score),
            ProducerPayload::default(),
        )
    }

    fn store() -> NullElectorStore {
        let store = NullElectorStore::new();
        for (i, name) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            store.seed_producer(producer(name, 100 - i as u128 * 10));
        }
        store
    }

    fn snapshot() -> BoundarySnapshot {
        BoundarySnapshot {
            tail_prev: Some(producer("b", 90)),
            tail: Some(producer("c", 80)),
            tail_next: Some(producer("d", 70)),
        }
    }

    #[test]
    fn snapshot_roundtrip_needs_no_lookups() {
        let store = store();
        let window = Window::from_snapshot(Tier::Main, &snapshot());
        assert_eq!(window.cut, 2);
        assert_eq!(window.into_snapshot(&store).unwrap(), snapshot());
        assert_eq!(store.neighbor_lookups(), 0);
    }

    #[test]
    fn step_down_then_refresh() {
        let store = store();
        let mut window = Window::from_snapshot(Tier::Main, &snapshot());
        window.step_down(&store).unwrap();
        let snap = window.into_snapshot(&store).unwrap();
        assert_eq!(snap.tail.unwrap().name.as_str(), "d");
        assert_eq!(snap.tail_prev.unwrap().name.as_str(), "c");
        assert_eq!(snap.tail_next.unwrap().name.as_str(), "e");
        assert_eq!(store.neighbor_lookups(), 1);
    }

    #[test]
    fn step_up_then_refresh() {
        let store = store();
        let mut window = Window::from_snapshot(Tier::Main, &snapshot());
        window.step_up(&store).unwrap();
        let snap = window.into_snapshot(&store).unwrap();
        assert_eq!(snap.tail.unwrap().name.as_str(), "b");
        assert_eq!(snap.tail_prev.unwrap().name.as_str(), "a");
        assert_eq!(snap.tail_next.unwrap().name.as_str(), "c");
    }

    #[test]
    fn locate_and_remove() {
        let mut window = Window::from_snapshot(Tier::Backup, &snapshot());
        assert!(matches!(window.locate(&producer("z", 95).rank_key()), Placement::Above));
        assert!(matches!(window.locate(&producer("z", 10).rank_key()), Placement::Below));
        assert!(matches!(
            window.locate(&producer("z", 85).rank_key()),
            Placement::Inside(1)
        ));
        assert_eq!(window.remove(&AccountName::new("c").unwrap()), Some(true));
        assert_eq!(window.cut, 1);
        assert_eq!(window.remove(&AccountName::new("d").unwrap()), Some(false));
        assert_eq!(window.remove(&AccountName::new("x").unwrap()), None);
    }

    #[test]
    fn mismatched_lookup_is_reported() {
        struct Broken;
        impl ProducerStore for Broken {
            fn get_producer(
                &self,
                _: &AccountName,
            ) -> Result<Option<ProducerInfo>, elector_store::StoreError> {
                Ok(None)
            }
            fn rank_neighbor(
                &self,
                _: &RankKey,
                _: Direction,
            ) -> Result<Option<ProducerInfo>, elector_store::StoreError> {
                Ok(Some(producer("a", 100)))
            }
            fn iter_ranked(
                &self,
                _: Option<&RankKey>,
                _: usize,
            ) -> Result<Vec<ProducerInfo>, elector_store::StoreError> {
                Ok(Vec::new())
            }
            fn producer_count(&self) -> Result<u64, elector_store::StoreError> {
                Ok(0)
            }
        }

        let mut window = Window::from_snapshot(Tier::Main, &snapshot());
        let err = window.extend_down(&Broken).unwrap_err();
        assert!(matches!(err, ElectionError::MarkerMismatch { .. }));
    }
}
