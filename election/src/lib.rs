//! Producer election over a scored population.
//!
//! The population lives in a rank-ordered index. The top `max_main`
//! producers form the main tier; the next ones, up to `max_backup`, form the
//! backup tier. Every score, activity or payload change is applied
//! incrementally: only the producers next to each tier boundary are looked
//! at, and the resulting membership diff is appended to a change log that
//! [`Elector::flush`] merges and forwards to the scheduler.

pub mod change_log;
pub mod config;
pub mod elector;
pub mod engine;
pub mod error;
pub mod initializer;
pub mod staged;
pub(crate) mod window;

pub use change_log::{merge_pending, FlushLimits, MergedBatch};
pub use config::ElectionConfig;
pub use elector::{Elector, FlushOutcome};
pub use engine::{check_invariants, process_elected_producer, resize_backup, ProducerMove};
pub use error::ElectionError;
pub use initializer::{initelects, Capacities};
pub use staged::StagedIndex;
