//! Database schema versioning.
//!
//! Tracks a monotonically increasing schema version in the meta database and
//! refuses to open a store written by a newer build.

use tracing::info;

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

/// The schema version that the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    /// Check the stored schema version and run any needed migrations.
    ///
    /// - Version 0 means a fresh database (no version stored yet).
    /// - If the stored version matches `CURRENT_SCHEMA_VERSION`, this is a no-op.
    /// - A stored version *higher* than this build supports is an error.
    pub fn run(env: &LmdbEnvironment) -> Result<(), LmdbError> {
        let current = Self::stored_version(env)?;

        if current == CURRENT_SCHEMA_VERSION {
            info!(version = current, "database schema is up to date");
            return Ok(());
        }
        if current > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::Corruption(format!(
                "database schema version {current} is newer than supported version {CURRENT_SCHEMA_VERSION}"
            )));
        }

        for version in current..CURRENT_SCHEMA_VERSION {
            info!(from = version, to = version + 1, "running migration");
            run_migration(version, version + 1)?;
        }

        let mut batch = env.write_batch()?;
        batch.put_meta("schema_version", &CURRENT_SCHEMA_VERSION.to_le_bytes())?;
        batch.commit()?;
        info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }

    pub fn stored_version(env: &LmdbEnvironment) -> Result<u32, LmdbError> {
        let rtxn = env.env.read_txn()?;
        match env.meta_db.get(&rtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("schema_version has unexpected byte length".into())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }
}

fn run_migration(from: u32, to: u32) -> Result<(), LmdbError> {
    match (from, to) {
        // Initial schema: nothing to migrate from a blank slate.
        (0, 1) => Ok(()),
        _ => Err(LmdbError::Corruption(format!(
            "no migration path from schema {from} to {to}"
        ))),
    }
}
