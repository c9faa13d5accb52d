//! Backend failures.

use std::time::Duration;
use thiserror::Error as ThisError;

/// A failure reported by the backing store or its connection pool.
///
/// Carried as the `source` of [`crate::Error::Connection`],
/// [`crate::Error::Read`] and [`crate::Error::Write`] so callers can inspect
/// the driver error that caused an operation to fail.
#[derive(Debug, ThisError)]
pub enum BackendError {
    /// `SQLite` driver error.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL driver error.
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    /// PostgreSQL pool checkout error.
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),

    /// PostgreSQL pool construction error.
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// No pooled connection became available in time.
    #[error("no pooled connection became available within {timeout:?}")]
    PoolTimeout {
        /// How long the checkout waited.
        timeout: Duration,
        /// Pool error, carrying the last connect or validation failure.
        #[source]
        source: r2d2::Error,
    },

    /// The runtime bridging an async driver could not be started.
    #[error("failed to start driver runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl BackendError {
    /// Returns true if the store rejected a write because of a uniqueness
    /// constraint (primary key or unique index).
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
                    && (err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
            },
            #[cfg(feature = "postgres")]
            Self::Postgres(err) => {
                err.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
            },
            _ => false,
        }
    }
}
