//! # Ledger Database Handle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ledger-bridge erp-pull ──┐                                            │
//! │  ledger-bridge push ──────┼──► ledger.db (WAL) ◄── ledger-bridge serve │
//! │  ledger-bridge import ────┘                                            │
//! │                                                                         │
//! │  DbConfig::new(path) ──► Database::new ──► migrations                  │
//! │                              │                                          │
//! │                              ├─► db.contacts()                          │
//! │                              └─► db.job_locks()                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Several processes open the same file: scheduled jobs may overlap each
//! other and the HTTP server. WAL lets readers proceed during a write, and
//! the busy timeout makes a second writer wait instead of failing.

use std::path::PathBuf;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::contact::ContactLedgerRepository;
use crate::repository::job_lock::JobLockRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the ledger lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private to one connection; gone when it closes.
    Memory,
}

/// How to open the ledger.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,
    pub max_connections: u32,
    /// How long a write waits for another process's lock.
    pub busy_timeout: Duration,
    pub migrate: bool,
}

impl DbConfig {
    /// A ledger file, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            location: DbLocation::File(path.into()),
            max_connections: 4,
            busy_timeout: Duration::from_secs(10),
            migrate: true,
        }
    }

    /// A throwaway ledger for tests.
    pub fn in_memory() -> Self {
        DbConfig {
            location: DbLocation::Memory,
            max_connections: 1,
            busy_timeout: Duration::from_secs(1),
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }
}

// =============================================================================
// Database
// =============================================================================

/// Pooled handle to the ledger. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the ledger and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let options = match &config.location {
            DbLocation::File(path) => {
                info!(path = %path.display(), "Opening ledger file");
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
            }
            DbLocation::Memory => {
                debug!("Opening in-memory ledger");
                SqliteConnectOptions::new().in_memory(true)
            }
        }
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1);
        if config.location == DbLocation::Memory {
            // Recycling the only connection would drop the database.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;

        let db = Database { pool };
        if config.migrate {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    /// Returns `(known, applied)` migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    pub fn contacts(&self) -> ContactLedgerRepository {
        ContactLedgerRepository::new(self.pool.clone())
    }

    pub fn job_locks(&self) -> JobLockRepository {
        JobLockRepository::new(self.pool.clone())
    }

    /// Returns true if a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn close(&self) {
        debug!("Closing ledger pool");
        self.pool.close().await;
    }
}
