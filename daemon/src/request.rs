//! Commands accepted by the daemon, from the CLI or as JSON lines in `run`
//! mode, and their execution against an [`Elector`].
//!
//! JSON form is externally tagged, one object per line:
//!
//! ```text
//! {"register": {"name": "bp1", "payload": {"public_key": "ab..", "url": "https://bp1", "location": 1}}}
//! {"vote": {"name": "bp1", "score": 1500}}
//! {"batch": {"updates": [{"name": "bp1", "score": 10}, {"name": "bp2", "score": 20}]}}
//! "flush"
//! ```

use anyhow::{anyhow, Context};
use elector_election::{ElectionError, Elector};
use elector_store::{Authority, ElectorStore, ScheduleSink, StoreError};
use elector_types::{AccountName, ProducerInfo, ProducerPayload, ProposedChanges, PublicKey, Score};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PayloadFields {
    /// Hex-encoded 32-byte key; all zeroes when omitted.
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub location: u16,
}

impl PayloadFields {
    fn into_payload(self) -> anyhow::Result<ProducerPayload> {
        let public_key = match self.public_key {
            Some(hex) => PublicKey::from_hex(&hex)
                .ok_or_else(|| anyhow!("public_key must be 64 hex characters"))?,
            None => PublicKey::default(),
        };
        Ok(ProducerPayload {
            public_key,
            url: self.url,
            location: self.location,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ScoreUpdate {
    pub name: String,
    pub score: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Init {
        caller: String,
        #[serde(default)]
        max_main: Option<u32>,
        #[serde(default)]
        max_backup: Option<u32>,
    },
    Register {
        name: String,
        #[serde(default)]
        payload: PayloadFields,
    },
    Unregister {
        name: String,
    },
    UpdatePayload {
        name: String,
        payload: PayloadFields,
    },
    Vote {
        name: String,
        score: u128,
    },
    Batch {
        updates: Vec<ScoreUpdate>,
    },
    SetMaxBackup {
        caller: String,
        max_backup: u32,
    },
    Flush,
    Status,
}

impl Request {
    pub fn parse_line(line: &str) -> anyhow::Result<Self> {
        serde_json::from_str(line).context("malformed request")
    }
}

fn account(name: &str) -> anyhow::Result<AccountName> {
    Ok(AccountName::new(name)?)
}

#[derive(Serialize)]
struct ProducerView<'a> {
    name: &'a str,
    score: String,
    active: bool,
    url: &'a str,
}

fn view(producers: &[ProducerInfo]) -> anyhow::Result<Value> {
    let views: Vec<_> = producers
        .iter()
        .map(|p| ProducerView {
            name: p.name.as_str(),
            score: p.score.to_string(),
            active: p.active,
            url: &p.payload.url,
        })
        .collect();
    Ok(serde_json::to_value(views)?)
}

fn changes_reply(changes: &ProposedChanges) -> anyhow::Result<Value> {
    Ok(json!({
        "ok": true,
        "main_changes": changes.main.len(),
        "backup_changes": changes.backup.len(),
        "changes": serde_json::to_value(changes)?,
    }))
}

/// Run one request. Errors are returned, not turned into replies; see
/// [`error_reply`].
pub fn execute<S, K, A>(elector: &Elector<S, K, A>, request: Request) -> anyhow::Result<Value>
where
    S: ElectorStore,
    K: ScheduleSink,
    A: Authority,
{
    match request {
        Request::Init {
            caller,
            max_main,
            max_backup,
        } => {
            let config = elector.config();
            let changes = elector.initelects(
                &account(&caller)?,
                max_main.unwrap_or(config.default_max_main),
                max_backup.unwrap_or(config.default_max_backup),
            )?;
            Ok(json!({
                "ok": true,
                "main": changes.main.resulting_size,
                "backup": changes.backup.resulting_size,
            }))
        }
        Request::Register { name, payload } => {
            changes_reply(&elector.register_producer(&account(&name)?, payload.into_payload()?)?)
        }
        Request::Unregister { name } => {
            changes_reply(&elector.unregister_producer(&account(&name)?)?)
        }
        Request::UpdatePayload { name, payload } => {
            changes_reply(&elector.update_payload(&account(&name)?, payload.into_payload()?)?)
        }
        Request::Vote { name, score } => {
            changes_reply(&elector.submit_score_update(&account(&name)?, Score::new(score))?)
        }
        Request::Batch { updates } => {
            let updates = updates
                .into_iter()
                .map(|u| Ok((account(&u.name)?, Score::new(u.score))))
                .collect::<anyhow::Result<Vec<_>>>()?;
            changes_reply(&elector.submit_batch(&updates)?)
        }
        Request::SetMaxBackup { caller, max_backup } => {
            changes_reply(&elector.set_max_backup(&account(&caller)?, max_backup)?)
        }
        Request::Flush => {
            let outcome = elector.flush()?;
            Ok(json!({ "ok": true, "flush": serde_json::to_value(outcome)? }))
        }
        Request::Status => match elector.election_state()? {
            None => Ok(json!({
                "ok": true,
                "initialized": false,
                "producers": elector.store().producer_count()?,
            })),
            Some(state) => Ok(json!({
                "ok": true,
                "initialized": true,
                "producers": elector.store().producer_count()?,
                "last_change_id": state.last_change_id,
                "max_main": state.max_main,
                "max_backup": state.max_backup,
                "min_backup": state.min_backup,
                "pending_log_entries": elector.pending_log_entries()?,
                "main": view(&elector.main_producers()?)?,
                "backup": view(&elector.backup_producers()?)?,
            })),
        },
    }
}

/// The JSON reply for a failed request.
pub fn error_reply(err: &anyhow::Error) -> Value {
    let usage_error = match err.downcast_ref::<ElectionError>() {
        Some(e) => e.is_usage_error(),
        None => err.downcast_ref::<StoreError>().is_none(),
    };
    json!({
        "ok": false,
        "error": format!("{err:#}"),
        "usage_error": usage_error,
    })
}
