//! # ledger-db: Storage for the Contact Ledger
//!
//! SQLite-backed persistence for the ledger rows that bridge the ERP and the
//! messaging platform, plus the lease table that keeps batch jobs from
//! overlapping.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ledger Bridge Data Flow                           │
//! │                                                                         │
//! │  Sync job (erp pull / messaging push / messaging import)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ledger-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories   │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                 │   │  (embedded)  │  │   │
//! │  │   │               │    │ ContactLedger-  │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Repository      │   │ 001_ledger   │  │   │
//! │  │   │               │    │ JobLockRepo     │   │ 002_locks    │  │   │
//! │  │   └───────────────┘    └─────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (ledger.db)                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("ledger.db")).await?;
//! let pending = db.contacts().select_for_push(100, false).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, DbLocation};

pub use repository::contact::{ContactLedgerRepository, UpsertOutcome};
pub use repository::job_lock::{JobLease, JobLockRepository};
