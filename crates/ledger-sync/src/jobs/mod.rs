//! # Sync Jobs
//!
//! The three batch jobs that reconcile the ledger with both remotes.
//!
//! ## Job Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ERP ──── erp_pull ────────────►  LEDGER  ──── messaging_push ───► MSG │
//! │    ▲       (upsert by ERP id,      (SQLite)     (pending rows,          │
//! │    │        force pending unless                 mark sent / error)     │
//! │    │        already sent)              ▲                                │
//! │    │                                   │                                │
//! │    └──── messaging_import ─────────────┴──────────────────────────── MSG│
//! │          (unknown phones: store as sent, link or create in ERP)         │
//! │                                                                         │
//! │  Each run holds a lease named after its job (job_locks table), so two  │
//! │  runs of the same job never overlap. Different jobs may overlap; each  │
//! │  row update is its own statement.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Isolation
//! A failing row is recorded (ledger status or report counter) and the run
//! moves on. A failing page fetch aborts the run with the error.

pub mod erp_pull;
pub mod messaging_import;
pub mod messaging_push;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ledger_db::Database;

use crate::error::{SyncError, SyncResult};

pub use erp_pull::{run_erp_pull, PullOptions, PullReport};
pub use messaging_import::{run_messaging_import, ImportOptions, ImportReport};
pub use messaging_push::{run_messaging_push, PushOptions, PushReport};

/// The batch jobs, each with its own lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    ErpPull,
    MessagingPush,
    MessagingImport,
}

impl JobName {
    pub const ALL: [JobName; 3] = [JobName::ErpPull, JobName::MessagingPush, JobName::MessagingImport];

    /// Row key in `job_locks`.
    pub fn lock_name(&self) -> &'static str {
        match self {
            JobName::ErpPull => "erp-contacts-pull",
            JobName::MessagingPush => "messaging-contacts-push",
            JobName::MessagingImport => "messaging-contacts-import",
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.lock_name())
    }
}

/// Runs `work` while holding the lease for `job`.
///
/// The lease is released whether `work` succeeds or fails. A lease left by
/// a crashed run blocks new runs until `ttl` has passed.
///
/// ## Errors
/// * `SyncError::JobAlreadyRunning` - another run holds the lease
/// * whatever `work` returns
pub async fn run_exclusive<T, Fut>(
    db: &Database,
    job: JobName,
    ttl: Duration,
    work: Fut,
) -> SyncResult<T>
where
    Fut: Future<Output = SyncResult<T>>,
{
    let locks = db.job_locks();
    let Some(lease) = locks.try_acquire(job.lock_name(), ttl).await? else {
        return Err(SyncError::JobAlreadyRunning(job.lock_name().to_string()));
    };

    info!(%job, "Job started");
    let result = work.await;

    match locks.release(&lease).await {
        Ok(true) => {}
        Ok(false) => warn!(%job, "Job lease was taken over before release"),
        Err(e) => warn!(%job, error = %e, "Failed to release job lease"),
    }

    match &result {
        Ok(_) => info!(%job, "Job finished"),
        Err(e) => warn!(%job, error = %e, "Job failed"),
    }
    result
}
