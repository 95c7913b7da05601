//! Abstract storage and collaborator traits for producer election.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The election engine depends only on the traits.

pub mod batch;
pub mod change_log;
pub mod election;
pub mod error;
pub mod external;
pub mod producer;

pub use batch::StoreBatch;
pub use change_log::ChangeLogStore;
pub use election::ElectionStateStore;
pub use error::StoreError;
pub use external::{Authority, ScheduleSink, ScheduleVerdict};
pub use producer::ProducerStore;

/// A backend holding the full population, the election state and the
/// change log, able to persist one event's writes atomically.
pub trait ElectorStore: ProducerStore + ElectionStateStore + ChangeLogStore {
    /// Apply every write in `batch` as one atomic unit.
    fn commit(&self, batch: StoreBatch) -> Result<(), StoreError>;
}
