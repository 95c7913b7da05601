//! Collaborators outside the storage engine that election hands data to or
//! asks for permission: the block-production scheduler and the account
//! authority.

use elector_types::{AccountName, ProposedChanges};

/// The scheduler's answer to a forwarded diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScheduleVerdict {
    Accepted,
    Rejected(String),
}

/// Downstream block-production scheduler consuming tier diffs.
///
/// Delivery is at least once. A flush forwards its diff before it removes
/// the merged log entries, so if that removal fails the next flush forwards
/// the same entries again. Implementations must tolerate a repeated diff.
pub trait ScheduleSink {
    fn forward_schedule_diff(&self, diff: &ProposedChanges) -> ScheduleVerdict;
}

/// Authorisation check for administrative entry points.
pub trait Authority {
    fn authenticate(&self, caller: &AccountName) -> bool;
}
