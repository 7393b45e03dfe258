//! # Sync Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Config         │  │  Transport      │  │  Protocol (bad XML,     │ │
//! │  │  (blank creds,  │  │  (connect,      │  │  bad JSON envelope)     │ │
//! │  │  bad URL)       │  │  timeout)       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Remote      │  │   Persistence   │  │      Jobs               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  RemoteFault    │  │  Database       │  │  JobAlreadyRunning      │ │
//! │  │  Remote{status} │  │                 │  │  Validation             │ │
//! │  │  Auth           │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only `Transport` is retried in place. Everything else surfaces to the
//! caller, and the jobs decide whether it costs one row or the whole run.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Longest body excerpt carried by a [`SyncError::Remote`].
pub const BODY_EXCERPT_CHARS: usize = 300;

/// Sync error type covering all remote and job failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Missing or invalid settings for a client.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// A response could not be parsed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The ERP answered with a fault envelope.
    #[error("Remote fault: {0}")]
    RemoteFault(String),

    /// A remote answered with a non-success status.
    #[error("Remote error{}: {body}", status_suffix(.status))]
    Remote { status: Option<u16>, body: String },

    /// Authentication did not yield a usable session.
    #[error("Authentication failed: {0}")]
    Auth(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The remote could not be reached (connect error, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    // =========================================================================
    // Data Errors
    // =========================================================================
    /// Input rejected before any remote call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ledger storage failed.
    #[error("Database error: {0}")]
    Database(String),

    // =========================================================================
    // Job Errors
    // =========================================================================
    /// Another run of the same job holds the lock.
    #[error("Job '{0}' is already running")]
    JobAlreadyRunning(String),
}

impl SyncError {
    /// Builds a `Remote` error, trimming the body to an excerpt.
    pub fn remote(status: Option<u16>, body: &str) -> Self {
        SyncError::Remote {
            status,
            body: excerpt(body),
        }
    }

    /// Returns true if the call may be retried in place.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(self, SyncError::Config(_) | SyncError::ConfigLoad(_))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// First [`BODY_EXCERPT_CHARS`] characters of a body, cut on a char boundary.
pub fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ledger_db::DbError> for SyncError {
    fn from(err: ledger_db::DbError) -> Self {
        SyncError::Database(err.to_string())
    }
}

impl From<ledger_core::CoreError> for SyncError {
    fn from(err: ledger_core::CoreError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::Config(format!("invalid URL: {err}"))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            SyncError::Transport(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::remote(Some(status.as_u16()), &err.to_string())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoad(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Transport("connection refused".into()).is_retryable());

        assert!(!SyncError::Config("blank token".into()).is_retryable());
        assert!(!SyncError::remote(Some(500), "oops").is_retryable());
        assert!(!SyncError::RemoteFault("Access Denied".into()).is_retryable());
    }

    #[test]
    fn test_remote_body_is_truncated() {
        let body = "é".repeat(400);
        let SyncError::Remote { status, body } = SyncError::remote(Some(502), &body) else {
            panic!("expected Remote");
        };
        assert_eq!(status, Some(502));
        assert_eq!(body.chars().count(), BODY_EXCERPT_CHARS);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            SyncError::remote(Some(404), "not found").to_string(),
            "Remote error (HTTP 404): not found"
        );
        assert_eq!(
            SyncError::remote(None, "odd").to_string(),
            "Remote error: odd"
        );
        assert!(SyncError::Config("x".into()).is_config_error());
    }
}
