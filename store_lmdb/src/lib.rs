//! LMDB storage backend for the producer elector.
//!
//! Implements the storage traits from `elector-store` using the `heed` LMDB
//! bindings. All logical stores share one environment so a single write
//! transaction can cover producers, election state and the change log.

pub mod change_log;
pub mod election;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod migration;
pub mod producer;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
pub use write_batch::WriteBatch;
