/// Error Module
///
/// This module defines the error type shared by the whole persistence layer.
/// Query and transaction failures surface to callers through it; migration
/// failures never do (see `migrations::MigrationOutcome`).
use thiserror::Error;

/// Error type for the carddav persistence layer.
///
/// The variants fall into three groups:
/// - engine failures (`Database`, `Query`)
/// - caller contract violations (transactions, conditions, arguments)
/// - environment problems (configuration, I/O, backend selection)
#[derive(Error, Debug)]
pub enum StoreError {
    /// Errors raised by the bundled SQLite handle outside of statement execution
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A statement failed; carries the engine's error text
    #[error("Query error: {0}")]
    Query(String),

    /// `start_transaction` was called while a transaction is active
    #[error("Cannot start nested transaction")]
    NestedTransaction,

    /// `end_transaction` was called while no transaction is active
    #[error("Attempt to commit a transaction while not within a transaction")]
    NoActiveTransaction,

    /// Malformed filter input
    #[error("Condition usage error: {0}")]
    ConditionUsage(String),

    /// A single-row lookup matched zero or several rows
    #[error("Single-row query ({sql}) returned {rows} rows")]
    UnexpectedRowCount { sql: String, rows: usize },

    /// Caller passed arguments the operation cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection reports a provider with no capability entry
    #[error("Unsupported database backend: {0}")]
    UnsupportedBackend(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Result to use StoreError as the error type.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Wraps an engine error as a `Query` error.
    pub fn query(err: impl std::fmt::Display) -> Self {
        StoreError::Query(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = StoreError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let query_err = StoreError::Query("no such table: x".to_string());
        assert_eq!(query_err.to_string(), "Query error: no such table: x");

        let rows_err = StoreError::UnexpectedRowCount {
            sql: "SELECT * FROM t".to_string(),
            rows: 0,
        };
        assert!(rows_err.to_string().contains("returned 0 rows"));

        assert_eq!(
            StoreError::NestedTransaction.to_string(),
            "Cannot start nested transaction"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        match store_err {
            StoreError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let store_err: StoreError = json_err.into();
        match store_err {
            StoreError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }

    #[test]
    fn test_query_helper_keeps_engine_text() {
        let err = StoreError::query("UNIQUE constraint failed: carddav_migrations.filename");
        match err {
            StoreError::Query(msg) => assert!(msg.contains("UNIQUE constraint failed")),
            _ => panic!("Expected Query error"),
        }
    }
}
