//! Fundamental types for producer election.
//!
//! This crate defines the data model shared across every other crate in the
//! workspace: account names, scores, the total-order [`RankKey`], producer
//! records, the per-tier boundary snapshots and the differential change sets
//! forwarded to the block-production scheduler.

pub mod changes;
pub mod error;
pub mod keys;
pub mod marker;
pub mod name;
pub mod producer;
pub mod rank;
pub mod score;
pub mod state;

pub use changes::{ChangeLogEntry, ChangeMap, ChangeRecord, ProposedChanges};
pub use error::TypesError;
pub use keys::PublicKey;
pub use marker::{BoundarySnapshot, ElectedQueue};
pub use name::AccountName;
pub use producer::{ProducerInfo, ProducerPayload};
pub use rank::{Direction, RankKey};
pub use score::Score;
pub use state::{ElectionState, Tier};
