//! Nullable scheduler: record forwarded diffs without acting on them.

use std::cell::{Cell, RefCell};

use elector_store::{ScheduleSink, ScheduleVerdict};
use elector_types::ProposedChanges;

/// A test scheduler that records every diff it accepts.
pub struct NullScheduler {
    received: RefCell<Vec<ProposedChanges>>,
    /// Reject the next `n` diffs.
    reject_next: Cell<usize>,
}

impl NullScheduler {
    pub fn new() -> Self {
        Self {
            received: RefCell::new(Vec::new()),
            reject_next: Cell::new(0),
        }
    }

    /// Make the next `n` forwards fail.
    pub fn reject_next(&self, n: usize) {
        self.reject_next.set(n);
    }

    /// All accepted diffs, oldest first.
    pub fn received(&self) -> Vec<ProposedChanges> {
        self.received.borrow().clone()
    }

    pub fn last(&self) -> Option<ProposedChanges> {
        self.received.borrow().last().cloned()
    }

    pub fn reset(&self) {
        self.received.borrow_mut().clear();
        self.reject_next.set(0);
    }
}

impl Default for NullScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleSink for NullScheduler {
    fn forward_schedule_diff(&self, diff: &ProposedChanges) -> ScheduleVerdict {
        let pending = self.reject_next.get();
        if pending > 0 {
            self.reject_next.set(pending - 1);
            return ScheduleVerdict::Rejected("scheduler busy".into());
        }
        self.received.borrow_mut().push(diff.clone());
        ScheduleVerdict::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_then_accepts() {
        let scheduler = NullScheduler::new();
        scheduler.reject_next(1);
        let diff = ProposedChanges::new(21, 3);
        assert!(matches!(
            scheduler.forward_schedule_diff(&diff),
            ScheduleVerdict::Rejected(_)
        ));
        assert_eq!(scheduler.forward_schedule_diff(&diff), ScheduleVerdict::Accepted);
        assert_eq!(scheduler.received().len(), 1);
    }
}
