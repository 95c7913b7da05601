//! Elector daemon: CLI over an LMDB data directory, plus a `run` mode that
//! serves JSON-line requests on stdin and flushes the change log on a timer.

mod config;
mod request;
mod run;
mod sink;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use elector_election::Elector;
use elector_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment, Migrator};
use elector_utils::{init_logging, LogFormat};

use crate::config::DaemonConfig;
use crate::request::{error_reply, execute, PayloadFields, Request};
use crate::sink::{ConfigAuthority, JsonLineScheduler};

#[derive(Parser)]
#[command(name = "elector-daemon", about = "Producer election daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "ELECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB store.
    #[arg(long, env = "ELECTOR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[arg(long, env = "ELECTOR_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "ELECTOR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Seconds between automatic flushes in `run` mode.
    #[arg(long, env = "ELECTOR_FLUSH_INTERVAL")]
    flush_interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Bootstrap both tiers from the current population.
    Init {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        max_main: Option<u32>,
        #[arg(long)]
        max_backup: Option<u32>,
    },
    /// Register a producer, or reactivate one keeping its score.
    Register {
        name: String,
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// Mark a producer inactive.
    Unregister { name: String },
    /// Replace a producer's payload.
    UpdatePayload {
        name: String,
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// Set a producer's score.
    Vote { name: String, score: u128 },
    /// Change the backup-tier ceiling.
    SetMaxBackup {
        #[arg(long)]
        caller: String,
        max_backup: u32,
    },
    /// Forward a merged slice of the change log to the scheduler.
    Flush,
    /// Print the election state and both tiers.
    Status,
    /// Serve JSON-line requests on stdin until EOF or Ctrl-C.
    Run,
}

#[derive(clap::Args)]
struct PayloadArgs {
    /// Hex-encoded 32-byte signing key.
    #[arg(long)]
    public_key: Option<String>,
    #[arg(long, default_value = "")]
    url: String,
    #[arg(long, default_value_t = 0)]
    location: u16,
}

impl From<PayloadArgs> for PayloadFields {
    fn from(args: PayloadArgs) -> Self {
        PayloadFields {
            public_key: args.public_key,
            url: args.url,
            location: args.location,
        }
    }
}

impl Command {
    fn into_request(self) -> Option<Request> {
        Some(match self {
            Command::Init {
                caller,
                max_main,
                max_backup,
            } => Request::Init {
                caller,
                max_main,
                max_backup,
            },
            Command::Register { name, payload } => Request::Register {
                name,
                payload: payload.into(),
            },
            Command::Unregister { name } => Request::Unregister { name },
            Command::UpdatePayload { name, payload } => Request::UpdatePayload {
                name,
                payload: payload.into(),
            },
            Command::Vote { name, score } => Request::Vote { name, score },
            Command::SetMaxBackup { caller, max_backup } => {
                Request::SetMaxBackup { caller, max_backup }
            }
            Command::Flush => Request::Flush,
            Command::Status => Request::Status,
            Command::Run => return None,
        })
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<DaemonConfig> {
    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_toml_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(secs) = cli.flush_interval_secs {
        config.flush_interval_secs = secs;
    }
    Ok(config)
}

fn open_store(config: &DaemonConfig) -> anyhow::Result<LmdbEnvironment> {
    check_data_dir(&config.data_dir).map_err(anyhow::Error::msg)?;
    let env = LmdbEnvironment::open(&config.data_dir, 8, config.map_size)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))?;
    Migrator::run(&env)?;

    let report = check_integrity(&env)?;
    if !report.is_healthy() {
        for error in &report.errors {
            tracing::error!(%error, "integrity check failed");
        }
        anyhow::bail!("store at {} failed its integrity check", config.data_dir.display());
    }
    tracing::info!(
        databases = report.databases_checked,
        entries = report.total_entries,
        "store integrity verified"
    );
    Ok(env)
}

fn scheduler(config: &DaemonConfig) -> anyhow::Result<JsonLineScheduler> {
    Ok(match &config.schedule_output {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening schedule output {}", path.display()))?;
            JsonLineScheduler::new(Box::new(file))
        }
        None => JsonLineScheduler::stdout(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level);

    let elector = Elector::new(
        open_store(&config)?,
        scheduler(&config)?,
        ConfigAuthority::new(&config.admin_accounts)?,
        config.election.clone(),
    );

    match cli.command.into_request() {
        Some(request) => match execute(&elector, request) {
            Ok(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
            Err(e) => {
                println!("{}", serde_json::to_string_pretty(&error_reply(&e))?);
                return Err(e);
            }
        },
        None => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            run::serve(
                &elector,
                stdin,
                std::io::stdout(),
                Duration::from_secs(config.flush_interval_secs.max(1)),
                shutdown,
            )
            .await?;
            tracing::info!("elector daemon exited cleanly");
        }
    }

    Ok(())
}
