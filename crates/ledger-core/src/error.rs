//! # Error Types
//!
//! ```text
//! ValidationError ──► CoreError ──► SyncError::Validation (ledger-sync)
//!   Required            UnknownStatus
//! ```

use thiserror::Error;

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stored `sync_status` is not pending, sent or error.
    #[error("Unknown sync status: {0}")]
    UnknownStatus(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required value is missing or blank.
    #[error("{field} is required")]
    Required { field: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnknownStatus("queued".into());
        assert_eq!(err.to_string(), "Unknown sync status: queued");

        let err: CoreError = ValidationError::Required {
            field: "erp.url".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Validation error: erp.url is required");
    }
}
