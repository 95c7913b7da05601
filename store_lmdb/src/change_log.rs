//! LMDB implementation of ChangeLogStore.
//!
//! Keys are big-endian ids so LMDB's byte order is append order.

use elector_store::{ChangeLogStore, StoreError};
use elector_types::ChangeLogEntry;

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub(crate) fn log_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn decode_id(key: &[u8]) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = key
        .try_into()
        .map_err(|_| LmdbError::Corruption(format!("change log key of {} bytes", key.len())))?;
    Ok(u64::from_be_bytes(arr))
}

impl ChangeLogStore for LmdbEnvironment {
    fn first_log_entries(&self, limit: usize) -> Result<Vec<ChangeLogEntry>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.change_log_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut result = Vec::new();
        for entry in iter.take(limit) {
            let (key, val) = entry.map_err(LmdbError::from)?;
            result.push(ChangeLogEntry {
                id: decode_id(key)?,
                changes: bincode::deserialize(val).map_err(LmdbError::from)?,
            });
        }
        Ok(result)
    }

    fn log_len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.change_log_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
