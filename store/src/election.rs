//! Election state storage trait.

use crate::StoreError;
use elector_types::ElectionState;

/// Persistent storage for the single election-state record.
pub trait ElectionStateStore {
    /// The stored state, or `None` before bootstrap.
    fn get_election_state(&self) -> Result<Option<ElectionState>, StoreError>;
}
