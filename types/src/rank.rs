//! The total-order rank key shared by the in-memory engine and the sorted
//! producer index.
//!
//! Order: active before inactive, then higher score first, then lower name.
//! A *smaller* key ranks *higher*. [`RankKey::to_bytes`] is the index's sort
//! key and is guaranteed to compare exactly like [`Ord`] on `RankKey`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::{AccountName, Score, TypesError};

const FLAG_LEN: usize = 1;
const SCORE_LEN: usize = 16;
const PREFIX_LEN: usize = FLAG_LEN + SCORE_LEN;

/// Which neighbour to fetch relative to a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The next better-ranked entry (smaller key).
    Up,
    /// The next worse-ranked entry (larger key).
    Down,
}

/// Total-order key of one producer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankKey {
    pub active: bool,
    pub score: Score,
    pub id: AccountName,
}

impl RankKey {
    pub fn new(id: AccountName, score: Score, active: bool) -> Self {
        Self { active, score, id }
    }

    /// Active with a positive score: counts toward filling the backup tier.
    pub fn is_eligible(&self) -> bool {
        self.active && self.score.is_positive()
    }

    /// Encode as an order-preserving byte string.
    ///
    /// Layout: `[inactive flag][!score, big-endian u128][name bytes]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PREFIX_LEN + self.id.as_bytes().len());
        out.push(u8::from(!self.active));
        out.extend_from_slice(&(!self.score.raw()).to_be_bytes());
        out.extend_from_slice(self.id.as_bytes());
        out
    }

    /// Decode a key produced by [`RankKey::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() <= PREFIX_LEN || bytes[0] > 1 {
            return Err(TypesError::InvalidName(hex::encode(bytes)));
        }
        let mut score = [0u8; SCORE_LEN];
        score.copy_from_slice(&bytes[FLAG_LEN..PREFIX_LEN]);
        Ok(Self {
            active: bytes[0] == 0,
            score: Score::new(!u128::from_be_bytes(score)),
            id: AccountName::from_bytes(&bytes[PREFIX_LEN..])?,
        })
    }
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .active
            .cmp(&self.active)
            .then_with(|| other.score.cmp(&self.score))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.active { "" } else { ", inactive" };
        write!(f, "{}({}{})", self.id, self.score, state)
    }
}
