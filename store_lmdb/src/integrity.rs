//! LMDB database integrity checks.
//!
//! Run on startup to detect a damaged index before any event is applied.

use std::path::Path;

use elector_types::RankKey;

use crate::environment::{LmdbEnvironment, CHANGE_LOG_DB, META_DB, PRODUCERS_DB, PRODUCER_RANKS_DB};
use crate::producer::decode_producer;
use crate::LmdbError;

/// Summary of an integrity check run.
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that every database opens and that the two producer indexes agree:
/// same row count, and every rank row filed under its record's rank key.
///
/// Read failures are recorded in the report rather than causing a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };
    let rtxn = env.env.read_txn()?;

    let databases = [
        (PRODUCERS_DB, env.producers_db),
        (PRODUCER_RANKS_DB, env.ranks_db),
        (META_DB, env.meta_db),
        (CHANGE_LOG_DB, env.change_log_db),
    ];
    let mut counts = [0u64; 4];
    for (i, (name, db)) in databases.iter().enumerate() {
        report.databases_checked += 1;
        match db.len(&rtxn) {
            Ok(count) => {
                counts[i] = count;
                report.total_entries += count;
            }
            Err(e) => report
                .errors
                .push(format!("failed to read database '{name}': {e}")),
        }
    }
    if counts[0] != counts[1] {
        report.errors.push(format!(
            "{} producers but {} rank rows",
            counts[0], counts[1]
        ));
    }

    let mut previous: Option<RankKey> = None;
    for entry in env.ranks_db.iter(&rtxn)? {
        let (key, val) = entry?;
        let info = match decode_producer(val) {
            Ok(info) => info,
            Err(e) => {
                report.errors.push(format!("undecodable rank row: {e}"));
                continue;
            }
        };
        let rank = info.rank_key();
        if rank.to_bytes() != key {
            report
                .errors
                .push(format!("rank row for {} filed under a stale key", info.name));
        }
        match env.producer_in(&rtxn, &info.name) {
            Ok(Some(stored)) if stored == info => {}
            Ok(_) => report
                .errors
                .push(format!("rank row for {} disagrees with its producer record", info.name)),
            Err(e) => report.errors.push(format!("reading producer {}: {e}", info.name)),
        }
        if previous.as_ref().is_some_and(|p| *p >= rank) {
            report
                .errors
                .push(format!("rank order broken at {rank}"));
        }
        previous = Some(rank);
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
