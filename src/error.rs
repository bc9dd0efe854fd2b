//! Error types for task-dl
//!
//! This module provides the error taxonomy for the library:
//! - [`Error`] - the top-level error returned by the facade and the store
//! - [`DatabaseError`] - storage failures with the failing operation described
//! - [`DownloadError`] - per-file download failures, split into transient and permanent

use thiserror::Error;

/// Result type alias for task-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for task-dl
///
/// Store failures (`Database`, `Sqlx`, `Serialization`) are fatal to the
/// operation that hit them and are always surfaced to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "worker_count")
        key: Option<String>,
    },

    /// Submission input rejected before anything was persisted
    #[error("validation error: {0}")]
    Validation(String),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Task record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown task identifier
    #[error("task not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,
}

impl Error {
    /// True for the store family of errors (`Database`, `Sqlx`, `Serialization`)
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Sqlx(_) | Error::Serialization(_)
        )
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// A table the store relies on is missing
    #[error("missing container: {0}")]
    MissingContainer(String),

    /// Stored value has an unexpected shape
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The task counter cannot be incremented any further
    #[error("task counter exhausted at {0}")]
    CounterExhausted(u32),
}

/// Per-file download errors
///
/// `Transient` failures are retried by the download pipeline. Once retries are
/// exhausted they are reported as `Permanent`, which is recorded on the file
/// and never aborts sibling files.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Transport error, non-2xx status or interrupted body; eligible for retry
    #[error("{0}")]
    Transient(String),

    /// Terminal failure for this file
    #[error("{0}")]
    Permanent(String),

    /// The fetch was interrupted by shutdown
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Reclassify a transient failure as permanent (after retries are exhausted)
    pub fn into_permanent(self) -> Self {
        match self {
            DownloadError::Transient(msg) => DownloadError::Permanent(msg),
            other => other,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_family_is_detected() {
        assert!(Error::Database(DatabaseError::QueryFailed("x".into())).is_store_error());
        assert!(
            Error::Serialization(serde_json::from_str::<String>("nope").unwrap_err())
                .is_store_error()
        );
        assert!(!Error::Validation("empty".into()).is_store_error());
        assert!(!Error::NotFound("7".into()).is_store_error());
    }

    #[test]
    fn into_permanent_only_changes_transient() {
        assert_eq!(
            DownloadError::Transient("HTTP 500".into()).into_permanent(),
            DownloadError::Permanent("HTTP 500".into())
        );
        assert_eq!(
            DownloadError::Cancelled.into_permanent(),
            DownloadError::Cancelled
        );
    }

    #[test]
    fn download_error_display_is_the_bare_message() {
        let err = DownloadError::Permanent("HTTP 404 Not Found for http://x/a".into());
        assert_eq!(err.to_string(), "HTTP 404 Not Found for http://x/a");
    }

    #[test]
    fn config_error_display_includes_message() {
        let err = Error::Config {
            message: "worker_count must be at least 1".into(),
            key: Some("worker_count".into()),
        };
        assert_eq!(
            err.to_string(),
            "configuration error: worker_count must be at least 1"
        );
    }
}
