//! # Ledger Bridge
//!
//! One binary for the external scheduler and the chat bot.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ledger-bridge                                  │
//! │                                                                         │
//! │  cron ──► erp-pull ─────────┐                                          │
//! │  cron ──► messaging-push ───┼──► run_exclusive ──► SQLite ledger       │
//! │  cron ──► messaging-import ─┘    (job lease)                           │
//! │                                                                         │
//! │  bot ───► serve (axum) ────────► ErpClient / MessagingClient           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A job started while another run of the same job holds its lease logs
//! `skipping: already running` and exits 0. Suggested cadence: pull and push
//! every 5 minutes, import every 10.

mod api;
mod cli;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledger_db::{Database, DbConfig};
use ledger_sync::{
    run_erp_pull, run_exclusive, run_messaging_import, run_messaging_push, BridgeConfig, ErpClient,
    JobName, MessagingClient, MessagingDirectory, SessionCache, SyncError, SyncResult,
};

use crate::api::ApiState;
use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = BridgeConfig::load(cli.config.clone()).context("Failed to load configuration")?;

    let db = open_database(&config).await?;
    let ttl = config.jobs.lock_ttl();
    let jobs = config.jobs.clone();

    let result = match cli.command {
        Command::ErpPull { batch_size, max_total } => {
            let erp = erp_client(&config)?;
            let options = Command::pull_options(&jobs, batch_size, max_total);
            run_job(&db, JobName::ErpPull, ttl, run_erp_pull(&db, &erp, options)).await
        }

        Command::MessagingPush { limit, retry_errors } => {
            let messaging = MessagingClient::new(&config.messaging).context("Messaging client")?;
            let options = Command::push_options(&jobs, limit, retry_errors);
            run_job(
                &db,
                JobName::MessagingPush,
                ttl,
                run_messaging_push(&db, &messaging, &options),
            )
            .await
        }

        Command::MessagingImport { page_size, max_pages } => {
            let erp = erp_client(&config)?;
            let messaging = MessagingClient::new(&config.messaging).context("Messaging client")?;
            let options = Command::import_options(&jobs, page_size, max_pages);
            run_job(
                &db,
                JobName::MessagingImport,
                ttl,
                run_messaging_import(&db, &messaging, &erp, &options),
            )
            .await
        }

        Command::Status => print_status(&db).await,

        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config).await
        }
    };

    db.close().await;
    result
}

/// Initializes the tracing subscriber. Logs go to stderr so that reports
/// printed on stdout stay machine-readable.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=ledger_sync=trace` - Trace the sync crate only
/// - Default: `info,ledger=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ledger=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the ledger, creating its directory on first use.
async fn open_database(config: &BridgeConfig) -> anyhow::Result<Database> {
    let path = config.database.resolve_path();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    info!(path = %path.display(), "Opening contact ledger");
    Database::new(DbConfig::new(path.clone()))
        .await
        .with_context(|| format!("Failed to open ledger at {}", path.display()))
}

fn erp_client(config: &BridgeConfig) -> anyhow::Result<ErpClient> {
    ErpClient::new(config.erp.clone(), Arc::new(SessionCache::default())).context("ERP client")
}

/// Runs one job under its lease and prints the report as JSON.
async fn run_job<T, Fut>(db: &Database, job: JobName, ttl: Duration, work: Fut) -> anyhow::Result<()>
where
    T: Serialize,
    Fut: Future<Output = SyncResult<T>>,
{
    match run_exclusive(db, job, ttl, work).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(SyncError::JobAlreadyRunning(name)) => {
            warn!(job = %name, "skipping: already running");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Job {job} failed")),
    }
}

async fn print_status(db: &Database) -> anyhow::Result<()> {
    let counts = db.contacts().count_by_status().await?;

    let locks = db.job_locks();
    let mut running = Vec::new();
    for job in JobName::ALL {
        if locks.is_held(job.lock_name()).await? {
            running.push(job.lock_name());
        }
    }

    let status = json!({
        "pending": counts.pending,
        "sent": counts.sent,
        "error": counts.error,
        "total": counts.total(),
        "running_jobs": running,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn serve(config: &BridgeConfig) -> anyhow::Result<()> {
    let erp = erp_client(config)?;

    let messaging: Option<Arc<dyn MessagingDirectory>> = if config.messaging.is_configured() {
        let client = MessagingClient::new(&config.messaging).context("Messaging client")?;
        Some(Arc::new(client))
    } else {
        warn!("Messaging credentials not configured, product searches will not be recorded");
        None
    };

    let state = ApiState {
        erp: Arc::new(erp),
        messaging,
    };
    api::serve(state, &config.server.bind_address()).await
}
