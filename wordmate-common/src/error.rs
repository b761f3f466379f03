//! Common error types for WordMate

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Common result type for WordMate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Operation-level errors
///
/// Entry-level validation problems inside a batch are not represented here;
/// they are reported as skipped entries alongside the batch result.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource already exists (e.g. duplicate email)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for a statement-level database error that belongs to a single
    /// batch entry (constraint violation) rather than to the transaction.
    pub fn is_entry_recoverable(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => matches!(
                db_err.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ),
            _ => false,
        }
    }

    /// True when another writer held the database lock (SQLITE_BUSY or
    /// SQLITE_LOCKED, including their extended codes)
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                matches!(primary, Some(5) | Some(6))
                    || db_err.message().contains("database is locked")
            }
            _ => false,
        }
    }
}
