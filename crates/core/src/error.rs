//! Storage-level error types for the offline store.
//!
//! These are the low-level failures produced by the SQLite layer. Everything
//! that crosses the engine's public surface is converted into a
//! [`ClassifiedError`](crate::taxonomy::ClassifiedError); the mapping is
//! deterministic and lives in the taxonomy module.

use tokio_rusqlite::rusqlite;

/// Errors produced by the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed (retryable).
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_MIGRATION: {0}")]
    MigrationFailed(String),

    /// Storage quota exhausted (SQLITE_FULL).
    #[error("STORE_QUOTA: {0}")]
    QuotaExceeded(String),

    /// The database file is corrupted or is not a database.
    #[error("STORE_CORRUPT: {0}")]
    Corrupted(String),

    /// A stored payload failed to serialize or deserialize.
    #[error("STORE_RECORD: {0}")]
    MalformedRecord(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, ref msg) = err {
            let detail = msg.clone().unwrap_or_else(|| code.to_string());
            match code.code {
                rusqlite::ErrorCode::DiskFull => return Error::QuotaExceeded(detail),
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    return Error::Corrupted(detail);
                }
                _ => {}
            }
        }
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e.into(),
            other => Error::Database(other),
        }
    }
}
