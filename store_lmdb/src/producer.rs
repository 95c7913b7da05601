//! LMDB implementation of ProducerStore.
//!
//! Producers are written twice: by name for point lookups and by rank key
//! for ordered scans. Both rows carry the full record so a neighbour lookup
//! is a single cursor step.

use std::ops::Bound;

use heed::RoTxn;

use elector_store::{ProducerStore, StoreError};
use elector_types::{AccountName, Direction, ProducerInfo, RankKey};

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub(crate) fn decode_producer(bytes: &[u8]) -> Result<ProducerInfo, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

impl LmdbEnvironment {
    pub(crate) fn producer_in(
        &self,
        txn: &RoTxn,
        name: &AccountName,
    ) -> Result<Option<ProducerInfo>, LmdbError> {
        self.producers_db
            .get(txn, name.as_bytes())?
            .map(decode_producer)
            .transpose()
    }

    /// Decode a rank row, checking it sits under the key it was filed by.
    fn rank_row(key: &[u8], value: &[u8]) -> Result<ProducerInfo, LmdbError> {
        let info = decode_producer(value)?;
        if info.rank_key().to_bytes() != key {
            return Err(LmdbError::Corruption(format!(
                "rank row for {} is filed under a stale key",
                info.name
            )));
        }
        Ok(info)
    }
}

impl ProducerStore for LmdbEnvironment {
    fn get_producer(&self, name: &AccountName) -> Result<Option<ProducerInfo>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.producer_in(&rtxn, name)?)
    }

    fn rank_neighbor(
        &self,
        key: &RankKey,
        direction: Direction,
    ) -> Result<Option<ProducerInfo>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let anchor = key.to_bytes();
        let found = match direction {
            Direction::Down => {
                let range = (Bound::Excluded(anchor.as_slice()), Bound::Unbounded);
                let mut iter = self.ranks_db.range(&rtxn, &range).map_err(LmdbError::from)?;
                iter.next().transpose().map_err(LmdbError::from)?
            }
            Direction::Up => {
                let range = (Bound::Unbounded, Bound::Excluded(anchor.as_slice()));
                let mut iter = self
                    .ranks_db
                    .rev_range(&rtxn, &range)
                    .map_err(LmdbError::from)?;
                iter.next().transpose().map_err(LmdbError::from)?
            }
        };
        Ok(found
            .map(|(k, v)| LmdbEnvironment::rank_row(k, v))
            .transpose()?)
    }

    fn iter_ranked(
        &self,
        after: Option<&RankKey>,
        limit: usize,
    ) -> Result<Vec<ProducerInfo>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let anchor = after.map(RankKey::to_bytes);
        let lower = match &anchor {
            Some(bytes) => Bound::Excluded(bytes.as_slice()),
            None => Bound::Unbounded,
        };
        let range = (lower, Bound::Unbounded);
        let iter = self.ranks_db.range(&rtxn, &range).map_err(LmdbError::from)?;

        let mut result = Vec::with_capacity(limit.min(1024));
        for entry in iter.take(limit) {
            let (k, v) = entry.map_err(LmdbError::from)?;
            result.push(LmdbEnvironment::rank_row(k, v)?);
        }
        Ok(result)
    }

    fn producer_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.producers_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
