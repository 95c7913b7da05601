//! Account names identifying producers and administrative callers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TypesError;

/// An account name. Ordering is byte-lexicographic, which is also the
/// tie-break order inside [`crate::RankKey`] (lower name wins at equal score).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountName(String);

impl AccountName {
    /// Longest accepted name, in bytes.
    pub const MAX_LEN: usize = 64;

    /// Create a name, rejecting empty or oversized input.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if s.is_empty() || s.len() > Self::MAX_LEN {
            return Err(TypesError::InvalidName(s));
        }
        Ok(Self(s))
    }

    /// Decode a name from the raw bytes stored at the tail of a rank key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|_| TypesError::InvalidName(String::from_utf8_lossy(bytes).into_owned()))?;
        Self::new(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for AccountName {
    type Error = TypesError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}
