//! Errors raised by the data model itself.

use thiserror::Error;

/// Errors produced while constructing or merging election types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid account name {0:?}: must be 1..=64 bytes")]
    InvalidName(String),

    #[error("impossible change sequence for {id}: {earlier} followed by {later}")]
    ImpossibleTransition {
        id: String,
        earlier: &'static str,
        later: &'static str,
    },
}
