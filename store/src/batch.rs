//! One event's worth of writes.

use elector_types::{ChangeLogEntry, ElectionState, ProducerInfo};

/// Writes committed together by [`crate::ElectorStore::commit`].
///
/// Producer puts replace any existing record with the same name, including
/// its old position in the rank order.
#[derive(Clone, Debug, Default)]
pub struct StoreBatch {
    pub producers: Vec<ProducerInfo>,
    pub state: Option<ElectionState>,
    pub append: Vec<ChangeLogEntry>,
    /// Ids of log entries to delete.
    pub consume: Vec<u64>,
}

impl StoreBatch {
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
            && self.state.is_none()
            && self.append.is_empty()
            && self.consume.is_empty()
    }
}
