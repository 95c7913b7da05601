//! Cached tier boundaries.
//!
//! Each tier keeps the last member it contains (`tail`) plus the entries on
//! either side of it in the full order. `None` marks a position that is
//! unknown and must be refreshed from the index before use.

use serde::{Deserialize, Serialize};

use crate::{ProducerInfo, RankKey};

/// `{tail_prev, tail, tail_next}` around one tier boundary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundarySnapshot {
    pub tail_prev: Option<ProducerInfo>,
    pub tail: Option<ProducerInfo>,
    pub tail_next: Option<ProducerInfo>,
}

impl BoundarySnapshot {
    pub fn tail_key(&self) -> Option<RankKey> {
        self.tail.as_ref().map(ProducerInfo::rank_key)
    }

    pub fn tail_prev_key(&self) -> Option<RankKey> {
        self.tail_prev.as_ref().map(ProducerInfo::rank_key)
    }

    pub fn tail_next_key(&self) -> Option<RankKey> {
        self.tail_next.as_ref().map(ProducerInfo::rank_key)
    }

    /// Known markers in rank order, labelled for diagnostics.
    pub fn known(&self) -> Vec<(&'static str, &ProducerInfo)> {
        [
            ("tail_prev", self.tail_prev.as_ref()),
            ("tail", self.tail.as_ref()),
            ("tail_next", self.tail_next.as_ref()),
        ]
        .into_iter()
        .filter_map(|(label, p)| p.map(|p| (label, p)))
        .collect()
    }
}

/// One tier: its current size plus its boundary snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectedQueue {
    pub size: u32,
    pub boundary: BoundarySnapshot,
}

impl ElectedQueue {
    /// Whether an entry with `key` sits at or above this tier's boundary,
    /// i.e. inside this tier or any tier ranked ahead of it.
    pub fn covers(&self, key: &RankKey) -> bool {
        match self.boundary.tail_key() {
            Some(tail) => *key <= tail,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountName, ProducerPayload, Score};

    fn producer(name: &str, score: u128) -> ProducerInfo {
        ProducerInfo::new(
            AccountName::new(name).unwrap(),
            Score::new(score),
            ProducerPayload::default(),
        )
    }

    #[test]
    fn covers_compares_against_tail() {
        let queue = ElectedQueue {
            size: 2,
            boundary: BoundarySnapshot {
                tail_prev: Some(producer("a", 30)),
                tail: Some(producer("b", 20)),
                tail_next: Some(producer("c", 10)),
            },
        };
        assert!(queue.covers(&producer("a", 30).rank_key()));
        assert!(queue.covers(&producer("b", 20).rank_key()));
        assert!(!queue.covers(&producer("c", 10).rank_key()));
        assert!(!ElectedQueue::default().covers(&producer("a", 30).rank_key()));
    }

    #[test]
    fn known_skips_empty_markers() {
        let snapshot = BoundarySnapshot {
            tail_prev: None,
            tail: Some(producer("b", 20)),
            tail_next: Some(producer("c", 10)),
        };
        let labels: Vec<_> = snapshot.known().into_iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["tail", "tail_next"]);
    }
}
