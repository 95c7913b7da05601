//! Change log storage trait.

use crate::StoreError;
use elector_types::ChangeLogEntry;

/// Append-only change log, consumed in id order.
pub trait ChangeLogStore {
    /// The oldest `limit` entries, ascending by id.
    fn first_log_entries(&self, limit: usize) -> Result<Vec<ChangeLogEntry>, StoreError>;

    /// Number of entries not yet consumed.
    fn log_len(&self) -> Result<u64, StoreError>;
}
