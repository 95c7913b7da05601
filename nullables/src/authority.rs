//! Nullable authority: a fixed allow-list of administrative callers.

use elector_store::Authority;
use elector_types::AccountName;
use std::collections::HashSet;

pub struct NullAuthority {
    allowed: HashSet<AccountName>,
}

impl NullAuthority {
    /// Allow exactly the given callers.
    pub fn allowing<I: IntoIterator<Item = AccountName>>(callers: I) -> Self {
        Self {
            allowed: callers.into_iter().collect(),
        }
    }

    /// Reject every caller.
    pub fn deny_all() -> Self {
        Self {
            allowed: HashSet::new(),
        }
    }
}

impl Authority for NullAuthority {
    fn authenticate(&self, caller: &AccountName) -> bool {
        self.allowed.contains(caller)
    }
}
