//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use crate::write_batch::WriteBatch;
use crate::LmdbError;

/// Database names created in every environment.
pub(crate) const PRODUCERS_DB: &str = "producers";
pub(crate) const PRODUCER_RANKS_DB: &str = "producer_ranks";
pub(crate) const META_DB: &str = "meta";
pub(crate) const CHANGE_LOG_DB: &str = "change_log";

/// Wraps the LMDB environment and all database handles.
///
/// - `producers`: account name bytes → bincode `ProducerInfo`
/// - `producer_ranks`: `RankKey::to_bytes()` → bincode `ProducerInfo`
/// - `meta`: fixed keys → bincode election state, schema version
/// - `change_log`: big-endian `u64` id → bincode `ProposedChanges`
pub struct LmdbEnvironment {
    pub(crate) env: Arc<Env>,
    pub(crate) producers_db: Database<Bytes, Bytes>,
    pub(crate) ranks_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    pub(crate) change_log_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per directory by this
        // process and the mapping is never truncated behind its back.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let producers_db = env.create_database(&mut wtxn, Some(PRODUCERS_DB))?;
        let ranks_db = env.create_database(&mut wtxn, Some(PRODUCER_RANKS_DB))?;
        let meta_db = env.create_database(&mut wtxn, Some(META_DB))?;
        let change_log_db = env.create_database(&mut wtxn, Some(CHANGE_LOG_DB))?;
        wtxn.commit()?;

        info!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(Self {
            env: Arc::new(env),
            producers_db,
            ranks_db,
            meta_db,
            change_log_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Begin a write batch spanning every database.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, LmdbError> {
        WriteBatch::new(self)
    }
}
