//! # Schema Migrations
//!
//! The SQL under `migrations/sqlite/` is compiled into the binary, so a
//! scheduled job run against a fresh path brings its own schema.
//!
//! ```text
//! migrations/sqlite/
//! ├── 001_contact_ledger.sql  contact_ledger + lookup indexes
//! └── 002_job_locks.sql       job_locks (one row per running job)
//! ```
//!
//! Applied files are checksummed in `_sqlx_migrations`; edit the schema by
//! adding a file, never by changing one.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(known = MIGRATOR.migrations.len(), "Applying ledger migrations");
    MIGRATOR.run(pool).await?;
    info!("Ledger schema up to date");
    Ok(())
}

/// `(known, applied)`. A ledger that was never migrated reports 0 applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: Option<i64> = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
        .fetch_one(pool)
        .await
        .ok();

    let applied = applied.and_then(|n| usize::try_from(n).ok()).unwrap_or(0);
    Ok((MIGRATOR.migrations.len(), applied))
}
