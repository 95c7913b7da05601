use elector_store::StoreError;
use elector_types::{Direction, Tier, TypesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error("election is already initialized")]
    AlreadyInitialized,

    #[error("election has not been initialized")]
    NotInitialized,

    #[error("caller {0} is not authorized")]
    Unauthorized(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("insufficient eligible producers: {have} < {need}")]
    InsufficientCandidates { have: u64, need: u64 },

    #[error("producer {0} not found")]
    UnknownProducer(String),

    #[error("batch of {have} updates exceeds the limit of {limit}")]
    BatchTooLarge { have: usize, limit: usize },

    #[error("{tier} tier invariant violated at {marker}: {detail}")]
    Invariant {
        tier: Tier,
        marker: &'static str,
        detail: String,
    },

    #[error("index lookup {direction:?} from {anchor} returned {found}")]
    MarkerMismatch {
        anchor: String,
        direction: Direction,
        found: String,
    },

    #[error("change merge failed: {0}")]
    ChangeMerge(#[from] TypesError),

    #[error("scheduler rejected diff: {0}")]
    SchedulerRejected(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ElectionError {
    /// Rejected before any mutation; the caller may retry with valid input.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInitialized
                | Self::NotInitialized
                | Self::Unauthorized(_)
                | Self::InvalidCapacity(_)
                | Self::InsufficientCandidates { .. }
                | Self::UnknownProducer(_)
                | Self::BatchTooLarge { .. }
        )
    }

    pub(crate) fn invariant(tier: Tier, marker: &'static str, detail: impl Into<String>) -> Self {
        Self::Invariant {
            tier,
            marker,
            detail: detail.into(),
        }
    }
}
