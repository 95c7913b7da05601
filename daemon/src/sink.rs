//! Daemon-side collaborators: a scheduler sink that emits each forwarded
//! diff as one JSON line, and an allow-list authority from the config.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Mutex;

use elector_store::{Authority, ScheduleSink, ScheduleVerdict};
use elector_types::{AccountName, ProposedChanges};
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
struct ScheduleLine<'a> {
    schedule_diff: &'a ProposedChanges,
}

pub struct JsonLineScheduler {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLineScheduler {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl ScheduleSink for JsonLineScheduler {
    fn forward_schedule_diff(&self, diff: &ProposedChanges) -> ScheduleVerdict {
        let line = match serde_json::to_string(&ScheduleLine { schedule_diff: diff }) {
            Ok(line) => line,
            Err(e) => return ScheduleVerdict::Rejected(format!("encoding diff: {e}")),
        };
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match writeln!(out, "{line}").and_then(|_| out.flush()) {
            Ok(()) => {
                debug!(records = diff.len(), "forwarded schedule diff");
                ScheduleVerdict::Accepted
            }
            Err(e) => ScheduleVerdict::Rejected(format!("writing diff: {e}")),
        }
    }
}

/// Callers listed in `admin_accounts`.
pub struct ConfigAuthority {
    admins: HashSet<AccountName>,
}

impl ConfigAuthority {
    pub fn new(admins: &[String]) -> anyhow::Result<Self> {
        let admins = admins
            .iter()
            .map(|a| AccountName::new(a.as_str()))
            .collect::<Result<_, _>>()?;
        Ok(Self { admins })
    }
}

impl Authority for ConfigAuthority {
    fn authenticate(&self, caller: &AccountName) -> bool {
        self.admins.contains(caller)
    }
}
