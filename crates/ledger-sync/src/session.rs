//! # ERP Session Cache
//!
//! Remembers the ERP user id per (URL, database, username) so each run
//! authenticates once instead of once per call.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_or_authenticate(key, login)                                       │
//! │       │                                                                 │
//! │       ├─ read lock: fresh entry? ──────────────────────► uid            │
//! │       │                                                                 │
//! │       └─ write lock: fresh entry now? (another task won) ► uid          │
//! │                   │                                                     │
//! │                   └─ login().await ──► store (uid, now + TTL) ──► uid   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cache is a plain value shared through `Arc`; there is no global
//! state. Failed logins are never stored.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::SyncResult;

/// How long an authenticated uid stays valid.
pub const SESSION_TTL: Duration = Duration::from_secs(15 * 60);

/// Identifies one ERP login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub base_url: String,
    pub database: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy)]
struct CachedSession {
    uid: i64,
    expires_at: Instant,
}

/// Time-bounded uid cache.
#[derive(Debug)]
pub struct SessionCache {
    ttl: Duration,
    entries: RwLock<HashMap<SessionKey, CachedSession>>,
}

impl Default for SessionCache {
    fn default() -> Self {
        SessionCache::new(SESSION_TTL)
    }
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        SessionCache {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached uid if it has not expired.
    pub async fn get(&self, key: &SessionKey) -> Option<i64> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.uid)
    }

    /// Returns a fresh uid, running `login` when there is none.
    ///
    /// Concurrent callers for the same key wait on the write lock and reuse
    /// the first caller's result.
    pub async fn get_or_authenticate<F, Fut>(&self, key: &SessionKey, login: F) -> SyncResult<i64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<i64>>,
    {
        if let Some(uid) = self.get(key).await {
            return Ok(uid);
        }

        let mut entries = self.entries.write().await;
        if let Some(session) = entries.get(key) {
            if session.expires_at > Instant::now() {
                return Ok(session.uid);
            }
        }

        debug!(url = %key.base_url, database = %key.database, "Authenticating ERP session");
        let uid = login().await?;
        entries.insert(
            key.clone(),
            CachedSession {
                uid,
                expires_at: Instant::now() + self.ttl,
            },
        );

        Ok(uid)
    }

    /// Drops the entry for `key`.
    pub async fn invalidate(&self, key: &SessionKey) {
        self.entries.write().await.remove(key);
    }
}
