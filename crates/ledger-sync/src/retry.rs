//! # Retry Policy
//!
//! Bounded in-place retries for remote calls.
//!
//! ```text
//! attempt 1 ──► Transport error ──► sleep(delay) ──► attempt 2 ──► ...
//!     │                                                   │
//!     └── any other error: returned at once               └── Ok: returned
//! ```
//!
//! Only [`SyncError::Transport`] is retried. A fault or an HTTP error means
//! the remote answered, and asking again would not change the answer.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// How many times to retry a call, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,

    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: u32, delay: Duration) -> Self {
        RetryPolicy { retries, delay }
    }

    /// A single attempt.
    pub const fn none() -> Self {
        RetryPolicy {
            retries: 0,
            delay: Duration::ZERO,
        }
    }

    fn schedule(&self) -> Constant {
        Constant::new(self.delay)
    }
}

/// Runs `operation`, retrying transport failures per `policy`.
///
/// ## Arguments
/// * `label` - Name of the call, for logs
/// * `policy` - Retry count and pause
/// * `operation` - Produces a fresh future per attempt
pub async fn with_retry<T, F, Fut>(label: &str, policy: RetryPolicy, mut operation: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    let mut schedule = policy.schedule();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(call = label, attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt <= policy.retries => {
                let pause = schedule.next_backoff().unwrap_or(policy.delay);
                warn!(
                    call = label,
                    attempt,
                    error = %err,
                    delay_ms = pause.as_millis() as u64,
                    "Transport failure, retrying"
                );
                tokio::time::sleep(pause).await;
            }
            Err(err) => return Err(err),
        }
    }
}
