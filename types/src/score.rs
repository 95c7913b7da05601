//! Producer scores.
//!
//! Scores are accumulated stake-votes represented as fixed-point integers
//! (u128) to avoid floating-point errors. The smallest unit is 1 raw.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative producer score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Score(u128);

impl Score {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    /// Whether a producer holding this score may be elected.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Score {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}
