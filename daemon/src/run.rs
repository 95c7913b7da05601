//! `run` mode: serve JSON-line requests from an input stream and flush the
//! change log on a fixed cadence until input closes or shutdown is signalled.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use elector_election::Elector;
use elector_store::{Authority, ElectorStore, ScheduleSink};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::request::{error_reply, execute, Request};

pub async fn serve<S, K, A, R, W>(
    elector: &Elector<S, K, A>,
    input: R,
    mut replies: W,
    flush_interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()>
where
    S: ElectorStore,
    K: ScheduleSink,
    A: Authority,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(flush_interval_secs = flush_interval.as_secs(), "serving requests");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = Request::parse_line(&line)
                    .and_then(|request| execute(elector, request))
                    .unwrap_or_else(|e| {
                        debug!(error = %e, "request failed");
                        error_reply(&e)
                    });
                writeln!(replies, "{reply}")?;
                replies.flush()?;
            }
            _ = ticker.tick() => {
                if let Err(e) = elector.flush() {
                    warn!(error = %e, "scheduled flush failed");
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    // Hand everything still queued to the scheduler before exiting.
    while elector.pending_log_entries()? > 0 {
        if let Err(e) = elector.flush() {
            warn!(error = %e, "final flush failed; entries stay queued");
            break;
        }
    }
    Ok(())
}
