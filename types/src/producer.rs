//! Producer records as stored in the sorted index.

use serde::{Deserialize, Serialize};

use crate::{AccountName, PublicKey, RankKey, Score};

/// Opaque per-producer data forwarded to the scheduler: signing authority
/// and location. Election never interprets it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerPayload {
    pub public_key: PublicKey,
    pub url: String,
    pub location: u16,
}

/// One scored entity of the population.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub name: AccountName,
    pub score: Score,
    pub active: bool,
    pub payload: ProducerPayload,
}

impl ProducerInfo {
    pub fn new(name: AccountName, score: Score, payload: ProducerPayload) -> Self {
        Self {
            name,
            score,
            active: true,
            payload,
        }
    }

    /// The producer's position key. Derived without touching storage.
    pub fn rank_key(&self) -> RankKey {
        RankKey::new(self.name.clone(), self.score, self.active)
    }

    pub fn is_eligible(&self) -> bool {
        self.active && self.score.is_positive()
    }

    /// Copy of this record with a different score.
    pub fn with_score(&self, score: Score) -> Self {
        Self {
            score,
            ..self.clone()
        }
    }
}
