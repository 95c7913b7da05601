//! LMDB implementation of ElectionStateStore.

use heed::RoTxn;

use elector_store::{ElectionStateStore, StoreError};
use elector_types::ElectionState;

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub(crate) const ELECTION_STATE_KEY: &[u8] = b"election_state";

impl LmdbEnvironment {
    pub(crate) fn election_state_in(&self, txn: &RoTxn) -> Result<Option<ElectionState>, LmdbError> {
        match self.meta_db.get(txn, ELECTION_STATE_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }
}

impl ElectionStateStore for LmdbEnvironment {
    fn get_election_state(&self) -> Result<Option<ElectionState>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.election_state_in(&rtxn)?)
    }
}
