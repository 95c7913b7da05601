//! The sorted producer index.

use crate::StoreError;
use elector_types::{AccountName, Direction, ProducerInfo, RankKey};

/// The full population, sorted by [`RankKey`].
pub trait ProducerStore {
    /// Get a producer by name.
    fn get_producer(&self, name: &AccountName) -> Result<Option<ProducerInfo>, StoreError>;

    /// The nearest producer strictly above (`Up`) or below (`Down`) `key`.
    ///
    /// `key` itself need not be present in the index.
    fn rank_neighbor(
        &self,
        key: &RankKey,
        direction: Direction,
    ) -> Result<Option<ProducerInfo>, StoreError>;

    /// Up to `limit` producers in rank order, starting strictly after
    /// `after` (or from the top when `None`).
    fn iter_ranked(
        &self,
        after: Option<&RankKey>,
        limit: usize,
    ) -> Result<Vec<ProducerInfo>, StoreError>;

    /// Total number of producers, active or not.
    fn producer_count(&self) -> Result<u64, StoreError>;
}
