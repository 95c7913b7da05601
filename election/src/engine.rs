//! The election engine: keeps the main and backup tiers correct after one
//! producer's rank key changes, without re-reading the population.
//!
//! Each tier boundary is a cut in the rank order: the main cut sits after
//! position `max_main`, the backup cut after `max_main + backup.size`. A move
//! of one producer changes how many producers sit above each cut by at most
//! one, so each cut shifts by at most one position to restore its count.
//! The backup cut may then move further while the backup tier grows into
//! eligible outsiders or sheds ineligible members, within its capacity.
//!
//! Lookups go to the index (which already reflects the move) only when the
//! cached `{tail_prev, tail, tail_next}` triple does not hold the neighbour a
//! step needs.

use std::collections::BTreeMap;

use elector_store::ProducerStore;
use elector_types::{
    AccountName, ChangeMap, ChangeRecord, ElectionState, ProducerInfo, ProducerPayload,
    ProposedChanges, RankKey, Tier,
};
use tracing::{debug, error};

use crate::window::{Placement, Window};
use crate::ElectionError;

/// One producer's record before and after an update.
#[derive(Clone, Debug)]
pub struct ProducerMove {
    /// `None` for a producer that did not exist before.
    pub previous: Option<ProducerInfo>,
    pub current: ProducerInfo,
}

impl ProducerMove {
    pub fn old_key(&self) -> Option<RankKey> {
        self.previous.as_ref().map(ProducerInfo::rank_key)
    }

    pub fn new_key(&self) -> RankKey {
        self.current.rank_key()
    }

    fn payload_changed(&self) -> bool {
        self.previous
            .as_ref()
            .is_some_and(|p| p.payload != self.current.payload)
    }
}

/// Apply one producer's move to `state`, recording tier membership changes
/// into `changes`.
///
/// `index` must already contain the producer at its new key.
pub fn process_elected_producer<S: ProducerStore>(
    index: &S,
    state: &mut ElectionState,
    mv: &ProducerMove,
    changes: &mut ProposedChanges,
) -> Result<(), ElectionError> {
    let new_key = mv.new_key();
    let old_key = mv.old_key();

    if old_key.as_ref() == Some(&new_key) {
        if mv.payload_changed() {
            refresh_marker_payloads(state, &mv.current);
            if let Some(tier) = state.tier_of(&new_key) {
                tier_changes(changes, tier).record(
                    mv.current.name.clone(),
                    ChangeRecord::Modify(mv.current.payload.clone()),
                )?;
            }
        }
        set_sizes(changes, state);
        return Ok(());
    }

    let before = state.clone();
    let was_in_main = old_key.as_ref().is_some_and(|k| before.main.covers(k));
    let was_in_elected = old_key.as_ref().is_some_and(|k| before.backup.covers(k));

    let main = shift_cut(index, Window::from_snapshot(Tier::Main, &before.main.boundary), mv, was_in_main)?;
    let mut backup = shift_cut(
        index,
        Window::from_snapshot(Tier::Backup, &before.backup.boundary),
        mv,
        was_in_elected,
    )?;
    rebalance_backup(index, &mut backup, state)?;

    let mut touched: BTreeMap<AccountName, ProducerInfo> = BTreeMap::new();
    for p in main.entries.iter().chain(backup.entries.iter()) {
        touched.insert(p.name.clone(), p.clone());
    }
    for (_, p) in before.main.boundary.known().into_iter().chain(before.backup.boundary.known()) {
        touched.entry(p.name.clone()).or_insert_with(|| p.clone());
    }
    touched.remove(&mv.current.name);

    state.main.boundary = main.into_snapshot(index)?;
    state.backup.boundary = backup.into_snapshot(index)?;

    for p in touched.values() {
        let key = p.rank_key();
        record_transition(changes, &p.name, &p.payload, before.tier_of(&key), state.tier_of(&key), false)?;
    }
    let from = old_key.as_ref().and_then(|k| before.tier_of(k));
    let to = state.tier_of(&new_key);
    record_transition(
        changes,
        &mv.current.name,
        &mv.current.payload,
        from,
        to,
        mv.payload_changed(),
    )?;
    if from != to {
        debug!(
            producer = %mv.current.name,
            from = from.map_or("none", |t| t.as_str()),
            to = to.map_or("none", |t| t.as_str()),
            "producer changed tier"
        );
    }

    set_sizes(changes, state);
    check_invariants(state).inspect_err(|e| error!(producer = %mv.current.name, "{e}"))
}

/// Grow or shrink the backup tier in place after a capacity change.
pub fn resize_backup<S: ProducerStore>(
    index: &S,
    state: &mut ElectionState,
    changes: &mut ProposedChanges,
) -> Result<(), ElectionError> {
    let before = state.clone();
    let mut backup = Window::from_snapshot(Tier::Backup, &before.backup.boundary);
    rebalance_backup(index, &mut backup, state)?;

    let touched = backup.entries.clone();
    state.backup.boundary = backup.into_snapshot(index)?;
    for p in &touched {
        let key = p.rank_key();
        record_transition(changes, &p.name, &p.payload, before.tier_of(&key), state.tier_of(&key), false)?;
    }
    set_sizes(changes, state);
    check_invariants(state)
}

/// Move one cut so the number of producers above it is unchanged by `mv`.
fn shift_cut<S: ProducerStore>(
    index: &S,
    mut window: Window,
    mv: &ProducerMove,
    was_in: bool,
) -> Result<Window, ElectionError> {
    let new_key = mv.new_key();
    window.remove(&mv.current.name);
    if window.entries.is_empty() {
        let anchor = mv.old_key().unwrap_or_else(|| new_key.clone());
        window.seed_around(index, &anchor, &mv.current)?;
    }

    let now_in = match window.locate(&new_key) {
        Placement::Above => true,
        Placement::Below => false,
        Placement::Inside(at) => {
            // Landing exactly on the cut keeps the producer on its old side.
            let inside = at < window.cut || (at == window.cut && was_in);
            window.entries.insert(at, mv.current.clone());
            if inside {
                window.cut += 1;
            }
            inside
        }
    };

    match (was_in, now_in) {
        (true, false) => window.step_down(index)?,
        (false, true) => window.step_up(index)?,
        _ => {}
    }
    Ok(window)
}

/// Enforce the backup capacity: shed members above `max_backup`, admit
/// eligible outsiders while below it, drop ineligible members while above
/// `min_backup`.
fn rebalance_backup<S: ProducerStore>(
    index: &S,
    window: &mut Window,
    state: &mut ElectionState,
) -> Result<(), ElectionError> {
    let (min, max) = (state.min_backup, state.max_backup);
    let size = &mut state.backup.size;

    while *size > max {
        window.step_up(index)?;
        *size -= 1;
    }
    loop {
        if *size < max && window.next(index)?.is_some_and(ProducerInfo::is_eligible) {
            window.step_down(index)?;
            *size += 1;
            continue;
        }
        if *size > min && window.tail(index)?.is_some_and(|t| !t.is_eligible()) {
            window.step_up(index)?;
            *size -= 1;
            continue;
        }
        return Ok(());
    }
}

fn record_transition(
    changes: &mut ProposedChanges,
    name: &AccountName,
    payload: &ProducerPayload,
    from: Option<Tier>,
    to: Option<Tier>,
    payload_changed: bool,
) -> Result<(), ElectionError> {
    if from == to {
        if let (Some(tier), true) = (to, payload_changed) {
            tier_changes(changes, tier).record(name.clone(), ChangeRecord::Modify(payload.clone()))?;
        }
        return Ok(());
    }
    if let Some(tier) = from {
        tier_changes(changes, tier).record(name.clone(), ChangeRecord::Delete)?;
    }
    if let Some(tier) = to {
        tier_changes(changes, tier).record(name.clone(), ChangeRecord::Add(payload.clone()))?;
    }
    Ok(())
}

fn tier_changes(changes: &mut ProposedChanges, tier: Tier) -> &mut ChangeMap {
    match tier {
        Tier::Main => &mut changes.main,
        Tier::Backup => &mut changes.backup,
    }
}

fn set_sizes(changes: &mut ProposedChanges, state: &ElectionState) {
    changes.main.resulting_size = state.main.size;
    changes.backup.resulting_size = state.backup.size;
}

fn refresh_marker_payloads(state: &mut ElectionState, current: &ProducerInfo) {
    for queue in [&mut state.main, &mut state.backup] {
        let b = &mut queue.boundary;
        for marker in [&mut b.tail_prev, &mut b.tail, &mut b.tail_next] {
            if let Some(p) = marker {
                if p.name == current.name {
                    *p = current.clone();
                }
            }
        }
    }
}

/// Check sizes, marker order within and across tiers, and the backup
/// eligibility rule.
pub fn check_invariants(state: &ElectionState) -> Result<(), ElectionError> {
    if state.main.size != state.max_main {
        return Err(ElectionError::invariant(
            Tier::Main,
            "size",
            format!("size {} != capacity {}", state.main.size, state.max_main),
        ));
    }
    let b = state.backup.size;
    if b < state.min_backup || b > state.max_backup {
        return Err(ElectionError::invariant(
            Tier::Backup,
            "size",
            format!("size {b} outside [{}, {}]", state.min_backup, state.max_backup),
        ));
    }

    for tier in [Tier::Main, Tier::Backup] {
        let snapshot = &state.queue(tier).boundary;
        if snapshot.tail.is_none() {
            return Err(ElectionError::invariant(tier, "tail", "tail marker is empty"));
        }
        let known = snapshot.known();
        for pair in known.windows(2) {
            let ((upper_label, upper), (lower_label, lower)) = (pair[0], pair[1]);
            if upper.rank_key() >= lower.rank_key() {
                return Err(ElectionError::invariant(
                    tier,
                    lower_label,
                    format!("{} does not rank below {upper_label} {}", lower.rank_key(), upper.rank_key()),
                ));
            }
        }
    }

    let main = &state.main.boundary;
    let backup = &state.backup.boundary;
    if let (Some(main_tail), Some(backup_tail)) = (main.tail_key(), backup.tail_key()) {
        if main_tail >= backup_tail {
            return Err(ElectionError::invariant(
                Tier::Backup,
                "tail",
                format!("backup tail {backup_tail} does not rank below main tail {main_tail}"),
            ));
        }
        if let Some(next) = main.tail_next_key() {
            if next > backup_tail {
                return Err(ElectionError::invariant(
                    Tier::Main,
                    "tail_next",
                    format!("{next} ranks below backup tail {backup_tail}"),
                ));
            }
        }
        if let Some(prev) = backup.tail_prev_key() {
            if prev < main_tail {
                return Err(ElectionError::invariant(
                    Tier::Backup,
                    "tail_prev",
                    format!("{prev} ranks above main tail {main_tail}"),
                ));
            }
        }
    }

    if b < state.max_backup && backup.tail_next.as_ref().is_some_and(ProducerInfo::is_eligible) {
        return Err(ElectionError::invariant(
            Tier::Backup,
            "tail_next",
            "eligible producer left outside a backup tier below capacity",
        ));
    }
    if b > state.min_backup && backup.tail.as_ref().is_some_and(|t| !t.is_eligible()) {
        return Err(ElectionError::invariant(
            Tier::Backup,
            "tail",
            "ineligible producer kept in a backup tier above its floor",
        ));
    }
    Ok(())
}
