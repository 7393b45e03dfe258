//! # Job Lock Repository
//!
//! Leases that keep two runs of the same batch job from overlapping, even
//! across processes sharing one database file.
//!
//! ## Lease Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  try_acquire("erp-contacts-pull", 24h)                                 │
//! │       │                                                                 │
//! │       ├── no row ─────────────────► INSERT            ──► Some(lease)  │
//! │       ├── row expired ────────────► take over holder  ──► Some(lease)  │
//! │       └── row held and live ──────────────────────────► None           │
//! │                                                                         │
//! │  release(lease)                                                        │
//! │       └── DELETE only if the row still names this holder               │
//! │                                                                         │
//! │  A crashed run leaves its row behind; it expires after the TTL.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// A held job lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLease {
    pub name: String,
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

/// Repository for job leases.
#[derive(Debug, Clone)]
pub struct JobLockRepository {
    pool: SqlitePool,
}

impl JobLockRepository {
    /// Creates a new JobLockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JobLockRepository { pool }
    }

    /// Tries to take the lease for `name`.
    ///
    /// Returns `None` while another holder's lease is still live.
    pub async fn try_acquire(&self, name: &str, ttl: Duration) -> DbResult<Option<JobLease>> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::days(1));
        let expires_at = now + ttl;
        let holder = Uuid::new_v4().to_string();

        // Single statement: insert, or take over an expired row.
        let result = sqlx::query(
            r#"
            INSERT INTO job_locks (name, holder, acquired_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(name) DO UPDATE SET
                holder = excluded.holder,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
            WHERE job_locks.expires_at <= ?5
            "#,
        )
        .bind(name)
        .bind(&holder)
        .bind(now)
        .bind(expires_at.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(job = name, "Job lock is held elsewhere");
            return Ok(None);
        }

        debug!(job = name, holder = %holder, "Job lock acquired");
        Ok(Some(JobLease {
            name: name.to_string(),
            holder,
            expires_at,
        }))
    }

    /// Releases a lease. Returns false if it was already taken over.
    pub async fn release(&self, lease: &JobLease) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM job_locks WHERE name = ?1 AND holder = ?2")
            .bind(&lease.name)
            .bind(&lease.holder)
            .execute(&self.pool)
            .await?;

        debug!(job = %lease.name, "Job lock released");
        Ok(result.rows_affected() > 0)
    }

    /// Returns true while some holder has a live lease on `name`.
    pub async fn is_held(&self, name: &str) -> DbResult<bool> {
        let live: Option<String> = sqlx::query_scalar(
            "SELECT holder FROM job_locks WHERE name = ?1 AND expires_at > ?2",
        )
        .bind(name)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(live.is_some())
    }
}
