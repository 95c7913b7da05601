//! The election service: every externally visible entry point.
//!
//! Each event stages its producer writes, works on a private copy of the
//! election state and persists index writes, state and change-log entry in
//! one store commit. Any error before the commit discards all of it.

use elector_store::{
    Authority, ElectorStore, ProducerStore, ScheduleSink, ScheduleVerdict, StoreBatch,
};
use elector_types::{
    AccountName, ChangeLogEntry, ElectionState, ProducerInfo, ProducerPayload, ProposedChanges,
    Score,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::change_log::{merge_pending, FlushLimits};
use crate::engine::{self, ProducerMove};
use crate::initializer::{self, Capacities};
use crate::staged::StagedIndex;
use crate::{ElectionConfig, ElectionError};

/// One producer-level edit inside an event.
#[derive(Clone, Debug)]
enum Edit {
    Score(Score),
    Payload(ProducerPayload),
    Deactivate,
    Register(ProducerPayload),
}

/// Result of one [`Elector::flush`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlushOutcome {
    /// Log entries merged and removed.
    pub merged_entries: usize,
    /// Per-account records in the forwarded diff (0 if nothing was sent).
    pub forwarded_records: usize,
    /// Log entries still pending after this run.
    pub remaining: u64,
}

pub struct Elector<S, K, A> {
    store: S,
    scheduler: K,
    authority: A,
    config: ElectionConfig,
}

impl<S, K, A> Elector<S, K, A>
where
    S: ElectorStore,
    K: ScheduleSink,
    A: Authority,
{
    pub fn new(store: S, scheduler: K, authority: A, config: ElectionConfig) -> Self {
        Self {
            store,
            scheduler,
            authority,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &K {
        &self.scheduler
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    // ── Administrative entry points ─────────────────────────────────────

    /// Bootstrap both tiers. Callable once; the initial diff goes straight
    /// to the scheduler instead of through the change log.
    pub fn initelects(
        &self,
        caller: &AccountName,
        max_main: u32,
        max_backup: u32,
    ) -> Result<ProposedChanges, ElectionError> {
        self.authorize(caller)?;
        if self.store.get_election_state()?.is_some() {
            return Err(ElectionError::AlreadyInitialized);
        }
        let caps = Capacities {
            max_main,
            max_backup,
            min_backup: self.config.min_backup,
        };
        let (state, changes) = initializer::initelects(&self.store, caps)?;

        if let ScheduleVerdict::Rejected(reason) = self.scheduler.forward_schedule_diff(&changes) {
            warn!(%reason, "scheduler rejected the bootstrap schedule");
            return Err(ElectionError::SchedulerRejected(reason));
        }
        self.store.commit(StoreBatch {
            state: Some(state),
            ..Default::default()
        })?;
        Ok(changes)
    }

    /// Change the backup ceiling and rebalance the backup tier to it.
    pub fn set_max_backup(
        &self,
        caller: &AccountName,
        max_backup: u32,
    ) -> Result<ProposedChanges, ElectionError> {
        self.authorize(caller)?;
        let mut state = self.require_state()?;
        if max_backup < state.min_backup {
            return Err(ElectionError::InvalidCapacity(format!(
                "max_backup {max_backup} is below min_backup {}",
                state.min_backup
            )));
        }
        let previous = state.max_backup;
        state.max_backup = max_backup;

        let mut changes = ProposedChanges::new(state.main.size, state.backup.size);
        engine::resize_backup(&self.store, &mut state, &mut changes)?;
        info!(
            from = previous,
            to = max_backup,
            backup_size = state.backup.size,
            "backup capacity changed"
        );
        self.commit_event(Vec::new(), state, changes)
    }

    // ── Producer events ─────────────────────────────────────────────────

    /// Record a new score for one producer.
    pub fn submit_score_update(
        &self,
        name: &AccountName,
        new_score: Score,
    ) -> Result<ProposedChanges, ElectionError> {
        self.apply(vec![(name.clone(), Edit::Score(new_score))])
    }

    /// Record several score updates as a single event with a single change
    /// log entry.
    pub fn submit_batch(
        &self,
        updates: &[(AccountName, Score)],
    ) -> Result<ProposedChanges, ElectionError> {
        if updates.len() > self.config.max_batch_updates {
            return Err(ElectionError::BatchTooLarge {
                have: updates.len(),
                limit: self.config.max_batch_updates,
            });
        }
        self.apply(
            updates
                .iter()
                .map(|(name, score)| (name.clone(), Edit::Score(*score)))
                .collect(),
        )
    }

    /// Add an active producer with zero score, or reactivate an existing one
    /// keeping its score.
    pub fn register_producer(
        &self,
        name: &AccountName,
        payload: ProducerPayload,
    ) -> Result<ProposedChanges, ElectionError> {
        self.apply(vec![(name.clone(), Edit::Register(payload))])
    }

    /// Mark a producer inactive; it ranks behind every active producer.
    pub fn unregister_producer(&self, name: &AccountName) -> Result<ProposedChanges, ElectionError> {
        self.apply(vec![(name.clone(), Edit::Deactivate)])
    }

    /// Replace a producer's payload (signing key, url, location).
    pub fn update_payload(
        &self,
        name: &AccountName,
        payload: ProducerPayload,
    ) -> Result<ProposedChanges, ElectionError> {
        self.apply(vec![(name.clone(), Edit::Payload(payload))])
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Forward a bounded merge of the oldest log entries to the scheduler
    /// and drop them. Safe to call at any cadence.
    ///
    /// The entries are dropped only after the scheduler accepts the diff. If
    /// that commit fails, they stay queued and the next flush forwards the
    /// same diff again (see [`ScheduleSink`]).
    pub fn flush(&self) -> Result<FlushOutcome, ElectionError> {
        let limits = FlushLimits {
            entry_threshold: self.config.flush_entry_threshold,
            row_cap: self.config.flush_row_cap,
        };
        let batch = merge_pending(&self.store, limits)?;
        if batch.is_empty() {
            return Ok(FlushOutcome {
                remaining: self.store.log_len()?,
                ..Default::default()
            });
        }

        let forwarded_records = batch.changes.len();
        if !batch.changes.is_empty() {
            if let ScheduleVerdict::Rejected(reason) =
                self.scheduler.forward_schedule_diff(&batch.changes)
            {
                warn!(%reason, entries = batch.consumed.len(), "scheduler rejected flushed diff");
                return Err(ElectionError::SchedulerRejected(reason));
            }
        }

        let merged_entries = batch.consumed.len();
        self.store.commit(StoreBatch {
            consume: batch.consumed,
            ..Default::default()
        })?;
        let remaining = self.store.log_len()?;
        info!(merged_entries, forwarded_records, remaining, "flushed change log");
        Ok(FlushOutcome {
            merged_entries,
            forwarded_records,
            remaining,
        })
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn election_state(&self) -> Result<Option<ElectionState>, ElectionError> {
        Ok(self.store.get_election_state()?)
    }

    /// Current main-tier members in rank order.
    pub fn main_producers(&self) -> Result<Vec<ProducerInfo>, ElectionError> {
        let state = self.require_state()?;
        Ok(self.store.iter_ranked(None, state.main.size as usize)?)
    }

    /// Current backup-tier members in rank order.
    pub fn backup_producers(&self) -> Result<Vec<ProducerInfo>, ElectionError> {
        let state = self.require_state()?;
        let after = state.main.boundary.tail_key();
        Ok(self
            .store
            .iter_ranked(after.as_ref(), state.backup.size as usize)?)
    }

    pub fn pending_log_entries(&self) -> Result<u64, ElectionError> {
        Ok(self.store.log_len()?)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn authorize(&self, caller: &AccountName) -> Result<(), ElectionError> {
        if self.authority.authenticate(caller) {
            Ok(())
        } else {
            Err(ElectionError::Unauthorized(caller.to_string()))
        }
    }

    fn require_state(&self) -> Result<ElectionState, ElectionError> {
        self.store
            .get_election_state()?
            .ok_or(ElectionError::NotInitialized)
    }

    /// Run one event. Before bootstrap only the index is updated.
    fn apply(&self, edits: Vec<(AccountName, Edit)>) -> Result<ProposedChanges, ElectionError> {
        let mut state = self.store.get_election_state()?;
        let mut staged = StagedIndex::new(&self.store);
        let mut changes = match &state {
            Some(s) => ProposedChanges::new(s.main.size, s.backup.size),
            None => ProposedChanges::default(),
        };

        for (name, edit) in edits {
            let previous = staged.get_producer(&name)?;
            let current = edited(&name, previous.as_ref(), edit)?;
            if previous.as_ref() == Some(&current) {
                continue;
            }
            staged.put(current.clone());
            if let Some(state) = state.as_mut() {
                let mv = ProducerMove { previous, current };
                engine::process_elected_producer(&staged, state, &mv, &mut changes)?;
                debug!(producer = %name, "processed producer update");
            }
        }

        let writes = staged.into_writes();
        match state {
            Some(state) => self.commit_event(writes, state, changes),
            None => {
                if !writes.is_empty() {
                    self.store.commit(StoreBatch {
                        producers: writes,
                        ..Default::default()
                    })?;
                }
                Ok(changes)
            }
        }
    }

    /// Persist one event: producer writes, state and, when membership
    /// changed, a new change-log entry.
    fn commit_event(
        &self,
        producers: Vec<ProducerInfo>,
        mut state: ElectionState,
        changes: ProposedChanges,
    ) -> Result<ProposedChanges, ElectionError> {
        let mut append = Vec::new();
        if !changes.is_empty() {
            state.last_change_id += 1;
            append.push(ChangeLogEntry {
                id: state.last_change_id,
                changes: changes.clone(),
            });
        }
        self.store.commit(StoreBatch {
            producers,
            state: Some(state),
            append,
            consume: Vec::new(),
        })?;
        Ok(changes)
    }
}

fn edited(
    name: &AccountName,
    previous: Option<&ProducerInfo>,
    edit: Edit,
) -> Result<ProducerInfo, ElectionError> {
    let unknown = || ElectionError::UnknownProducer(name.to_string());
    Ok(match (previous, edit) {
        (None, Edit::Register(payload)) => ProducerInfo::new(name.clone(), Score::ZERO, payload),
        (Some(p), Edit::Register(payload)) => ProducerInfo {
            active: true,
            payload,
            ..p.clone()
        },
        (Some(p), Edit::Score(score)) => p.with_score(score),
        (Some(p), Edit::Payload(payload)) => ProducerInfo {
            payload,
            ..p.clone()
        },
        (Some(p), Edit::Deactivate) => ProducerInfo {
            active: false,
            ..p.clone()
        },
        (None, _) => return Err(unknown()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use elector_nullables::{NullAuthority, NullElectorStore, NullScheduler};
    use elector_types::{ChangeRecord, PublicKey};

    type TestElector = Elector<NullElectorStore, NullScheduler, NullAuthority>;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn admin() -> AccountName {
        name("admin")
    }

    fn config() -> ElectionConfig {
        ElectionConfig {
            min_backup: 1,
            ..ElectionConfig::default()
        }
    }

    /// `count` producers `p00, p01, ...` with descending scores, bootstrapped
    /// with the given capacities.
    fn elector(count: u128, max_main: u32, max_backup: u32) -> TestElector {
        let store = NullElectorStore::new();
        for i in 0..count {
            store.seed_producer(ProducerInfo::new(
                name(&format!("p{i:02}")),
                Score::new(1_000 - i * 10),
                ProducerPayload::default(),
            ));
        }
        let elector = Elector::new(
            store,
            NullScheduler::new(),
            NullAuthority::allowing([admin()]),
            config(),
        );
        elector.initelects(&admin(), max_main, max_backup).unwrap();
        elector
    }

    fn names(producers: Vec<ProducerInfo>) -> Vec<String> {
        producers.into_iter().map(|p| p.name.to_string()).collect()
    }

    #[test]
    fn initelects_requires_authority_and_runs_once() {
        let store = NullElectorStore::new();
        let denied = Elector::new(store, NullScheduler::new(), NullAuthority::deny_all(), config());
        assert!(matches!(
            denied.initelects(&admin(), 2, 2),
            Err(ElectionError::Unauthorized(_))
        ));

        let elector = elector(8, 2, 2);
        assert!(matches!(
            elector.initelects(&admin(), 2, 2),
            Err(ElectionError::AlreadyInitialized)
        ));
        assert_eq!(elector.scheduler().received().len(), 1);
        assert!(elector.scheduler().received()[0].main.replace_all);
    }

    #[test]
    fn rejected_bootstrap_is_not_committed() {
        let store = NullElectorStore::new();
        for i in 0..6u128 {
            store.seed_producer(ProducerInfo::new(
                name(&format!("p{i}")),
                Score::new(100 - i),
                ProducerPayload::default(),
            ));
        }
        let elector = Elector::new(
            store,
            NullScheduler::new(),
            NullAuthority::allowing([admin()]),
            config(),
        );
        elector.scheduler().reject_next(1);
        assert!(matches!(
            elector.initelects(&admin(), 2, 2),
            Err(ElectionError::SchedulerRejected(_))
        ));
        assert!(elector.election_state().unwrap().is_none());
        elector.initelects(&admin(), 2, 2).unwrap();
        assert!(elector.election_state().unwrap().is_some());
    }

    #[test]
    fn promotion_swaps_main_tail() {
        let elector = elector(8, 3, 2);
        // p04 sits in backup; lift it above p01.
        let changes = elector
            .submit_score_update(&name("p04"), Score::new(995))
            .unwrap();

        assert_eq!(names(elector.main_producers().unwrap()), ["p00", "p04", "p01"]);
        assert_eq!(names(elector.backup_producers().unwrap()), ["p02", "p03"]);
        assert_eq!(changes.main.entries[&name("p02")], ChangeRecord::Delete);
        assert!(matches!(changes.main.entries[&name("p04")], ChangeRecord::Add(_)));
        assert_eq!(changes.backup.entries[&name("p04")], ChangeRecord::Delete);
        assert!(matches!(changes.backup.entries[&name("p02")], ChangeRecord::Add(_)));
        assert_eq!(elector.pending_log_entries().unwrap(), 1);
    }

    #[test]
    fn score_change_within_a_tier_logs_nothing() {
        let elector = elector(8, 3, 2);
        let changes = elector.submit_score_update(&name("p00"), Score::new(5_000)).unwrap();
        assert!(changes.is_empty());
        assert_eq!(elector.pending_log_entries().unwrap(), 0);
        assert_eq!(elector.election_state().unwrap().unwrap().last_change_id, 0);
    }

    #[test]
    fn repeated_update_is_idempotent() {
        let elector = elector(8, 3, 2);
        elector.submit_score_update(&name("p06"), Score::new(2_000)).unwrap();
        let state = elector.election_state().unwrap();
        let changes = elector.submit_score_update(&name("p06"), Score::new(2_000)).unwrap();
        assert!(changes.is_empty());
        assert_eq!(elector.election_state().unwrap(), state);
    }

    #[test]
    fn payload_update_of_a_member_is_a_modify() {
        let elector = elector(8, 3, 2);
        let payload = ProducerPayload {
            public_key: PublicKey([7; 32]),
            url: "https://p01.example".into(),
            location: 3,
        };
        let changes = elector.update_payload(&name("p01"), payload.clone()).unwrap();
        assert_eq!(changes.main.entries[&name("p01")], ChangeRecord::Modify(payload));
        assert!(changes.backup.is_empty());
    }

    #[test]
    fn unknown_producer_fails_the_whole_batch() {
        let elector = elector(8, 3, 2);
        let before = elector.election_state().unwrap();
        let err = elector
            .submit_batch(&[(name("p05"), Score::new(3_000)), (name("ghost"), Score::new(1))])
            .unwrap_err();
        assert!(matches!(err, ElectionError::UnknownProducer(_)));
        assert_eq!(elector.election_state().unwrap(), before);
        assert_eq!(
            elector.store().get_producer(&name("p05")).unwrap().unwrap().score,
            Score::new(950)
        );
        assert_eq!(elector.pending_log_entries().unwrap(), 0);
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let elector = elector(8, 3, 2);
        let updates: Vec<_> = (0..31).map(|_| (name("p00"), Score::new(1))).collect();
        assert!(matches!(
            elector.submit_batch(&updates),
            Err(ElectionError::BatchTooLarge { have: 31, limit: 30 })
        ));
    }

    #[test]
    fn batch_appends_one_entry() {
        let elector = elector(10, 3, 2);
        elector
            .submit_batch(&[
                (name("p07"), Score::new(2_000)),
                (name("p08"), Score::new(1_990)),
            ])
            .unwrap();
        assert_eq!(elector.pending_log_entries().unwrap(), 1);
        assert_eq!(names(elector.main_producers().unwrap()), ["p07", "p08", "p00"]);
    }

    #[test]
    fn registration_before_bootstrap_only_touches_the_index() {
        let store = NullElectorStore::new();
        let elector = Elector::new(
            store,
            NullScheduler::new(),
            NullAuthority::allowing([admin()]),
            config(),
        );
        let changes = elector
            .register_producer(&name("early"), ProducerPayload::default())
            .unwrap();
        assert!(changes.is_empty());
        assert!(elector.store().get_producer(&name("early")).unwrap().is_some());
        assert!(matches!(
            elector.main_producers(),
            Err(ElectionError::NotInitialized)
        ));
    }

    #[test]
    fn unregister_and_reregister_keep_score() {
        let elector = elector(8, 3, 2);
        let changes = elector.unregister_producer(&name("p01")).unwrap();
        assert_eq!(changes.main.entries[&name("p01")], ChangeRecord::Delete);
        assert_eq!(names(elector.main_producers().unwrap()), ["p00", "p02", "p03"]);

        elector
            .register_producer(&name("p01"), ProducerPayload::default())
            .unwrap();
        let p01 = elector.store().get_producer(&name("p01")).unwrap().unwrap();
        assert!(p01.active);
        assert_eq!(p01.score, Score::new(990));
        assert_eq!(names(elector.main_producers().unwrap()), ["p00", "p01", "p02"]);
    }

    #[test]
    fn set_max_backup_grows_and_shrinks() {
        let elector = elector(10, 3, 2);
        assert!(matches!(
            elector.set_max_backup(&name("mallory"), 4),
            Err(ElectionError::Unauthorized(_))
        ));
        assert!(matches!(
            elector.set_max_backup(&admin(), 0),
            Err(ElectionError::InvalidCapacity(_))
        ));

        let grown = elector.set_max_backup(&admin(), 4).unwrap();
        assert_eq!(grown.backup.resulting_size, 4);
        assert_eq!(names(elector.backup_producers().unwrap()), ["p03", "p04", "p05", "p06"]);

        let shrunk = elector.set_max_backup(&admin(), 1).unwrap();
        assert_eq!(shrunk.backup.resulting_size, 1);
        assert_eq!(shrunk.backup.entries.len(), 3);
        assert_eq!(names(elector.backup_producers().unwrap()), ["p03"]);
    }

    #[test]
    fn flush_forwards_and_consumes() {
        let elector = elector(8, 3, 2);
        elector.submit_score_update(&name("p04"), Score::new(995)).unwrap();
        elector.submit_score_update(&name("p04"), Score::new(1)).unwrap();
        assert_eq!(elector.pending_log_entries().unwrap(), 2);

        elector.scheduler().reset();
        let outcome = elector.flush().unwrap();
        assert_eq!(outcome.merged_entries, 2);
        assert_eq!(outcome.remaining, 0);
        // p04 went up and back down: p02 left main and came back.
        let diff = elector.scheduler().last().unwrap();
        assert_eq!(outcome.forwarded_records, 3);
        assert_eq!(diff.backup.entries[&name("p04")], ChangeRecord::Delete);
        assert!(matches!(diff.backup.entries[&name("p05")], ChangeRecord::Add(_)));
        assert!(matches!(diff.main.entries[&name("p02")], ChangeRecord::Modify(_)));
        assert!(!diff.main.entries.contains_key(&name("p04")));

        assert_eq!(elector.flush().unwrap(), FlushOutcome::default());
    }

    #[test]
    fn rejected_flush_keeps_the_log() {
        let elector = elector(8, 3, 2);
        elector.submit_score_update(&name("p04"), Score::new(995)).unwrap();
        elector.scheduler().reject_next(1);
        assert!(matches!(elector.flush(), Err(ElectionError::SchedulerRejected(_))));
        assert_eq!(elector.pending_log_entries().unwrap(), 1);
        assert_eq!(elector.flush().unwrap().merged_entries, 1);
    }

    #[test]
    fn flush_whose_commit_fails_forwards_again() {
        let elector = elector(8, 3, 2);
        elector.submit_score_update(&name("p04"), Score::new(995)).unwrap();
        elector.scheduler().reset();

        elector.store().fail_commits(true);
        assert!(matches!(elector.flush(), Err(ElectionError::Store(_))));
        elector.store().fail_commits(false);
        assert_eq!(elector.pending_log_entries().unwrap(), 1);

        let outcome = elector.flush().unwrap();
        assert_eq!(outcome.merged_entries, 1);
        assert_eq!(outcome.remaining, 0);
        let received = elector.scheduler().received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], received[1]);
    }

    #[test]
    fn failed_commit_leaves_state_untouched() {
        let elector = elector(8, 3, 2);
        let before = elector.election_state().unwrap();
        elector.store().fail_commits(true);
        assert!(elector.submit_score_update(&name("p05"), Score::new(5_000)).is_err());
        elector.store().fail_commits(false);
        assert_eq!(elector.election_state().unwrap(), before);
        assert_eq!(elector.pending_log_entries().unwrap(), 0);
    }
}
