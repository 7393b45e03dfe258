//! # Ledger Storage Errors
//!
//! ```text
//!  sqlx::Error ──► DbError ──► SyncError::Database (ledger-sync)
//!                                 │
//!                                 ├─ row-level: the job counts the row and moves on
//!                                 └─ run-level: the job aborts, CLI exits non-zero
//! ```
//!
//! SQLite reports constraint failures only as message text, so the unique
//! check below parses `UNIQUE constraint failed: <table>.<column>`.

use thiserror::Error;

/// Result type for ledger storage.
pub type DbResult<T> = Result<T, DbError>;

/// Ledger storage failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Two ledger rows would share an ERP id.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// The file could not be opened, or the pool is closed.
    #[error("Cannot open ledger: {0}")]
    Unavailable(String),

    /// Another writer held the file, or no pooled connection freed up in time.
    #[error("Ledger busy: {0}")]
    Busy(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    /// A stored value does not decode into its Rust type.
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("row", "?"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if let Some(field) = message.strip_prefix(UNIQUE_PREFIX) {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: String::new(),
                    }
                } else if message.contains("database is locked") {
                    DbError::Busy(message.to_string())
                } else {
                    DbError::Query(message.to_string())
                }
            }

            sqlx::Error::ColumnDecode { index, source } => {
                DbError::CorruptRow(format!("column {index}: {source}"))
            }
            sqlx::Error::Decode(source) => DbError::CorruptRow(source.to_string()),

            sqlx::Error::PoolTimedOut => DbError::Busy("no free connection".to_string()),
            sqlx::Error::PoolClosed => DbError::Unavailable("pool is closed".to_string()),
            sqlx::Error::Io(e) => DbError::Unavailable(e.to_string()),

            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::Migration(err.to_string())
    }
}
