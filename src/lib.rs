//! # Userstore
//!
//! A transactional single-table record store.
//!
//! Userstore exposes create/read/update/delete/search operations over one
//! table of `(user_id, user_email, subject_id)` rows held in a relational
//! database, and guarantees that ids are never silently duplicated, that
//! absent rows are never mutated, and that every write commits or rolls back
//! as a unit.
//!
//! ## Features
//!
//! - Pooled connections with a liveness probe at open and pre-ping on checkout
//! - Existence-gated mutation with typed `AlreadyExists` / `NotFound` errors
//! - All-or-nothing batch inserts that skip ids already present
//! - Parameterized search with optional, AND-ed filters
//! - Pluggable backends (`SQLite` by default, PostgreSQL with `--features postgres`)
//!
//! ## Example
//!
//! ```rust
//! use userstore::{RecordStore, SearchFilter};
//!
//! let store = RecordStore::open("sqlite::memory:")?;
//! store.create(10010, "john.doe@example.com", 5)?;
//! store.create(10011, "jane.smith@example.com", 10)?;
//!
//! let johns = store.search(&SearchFilter::new().with_email_containing("john"))?;
//! assert_eq!(johns.len(), 1);
//! # Ok::<(), userstore::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{Settings, StoreConfig};
pub use models::{Record, SearchFilter};
pub use services::RecordStore;
pub use storage::{BackendError, ConnectionManager, ScopedConnection, Transaction};

/// Error type for userstore operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Connection` | The store is unreachable at open, or no pooled connection could be acquired |
/// | `AlreadyExists` | `create` targets an id that is already stored |
/// | `NotFound` | `update`, `update_email`, `update_subject` or `delete` targets an absent id |
/// | `Read` | A read statement fails in the backing store |
/// | `Write` | A write statement, commit or rollback fails; the transaction was rolled back |
/// | `InvalidInput` | Configuration is malformed (bad table identifier, empty target) |
/// | `FeatureNotEnabled` | The target needs a backend that was not compiled in |
/// | `OperationFailed` | Ambient failures: config file I/O, logging initialization |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The backing store could not be reached.
    #[error("operation '{operation}' could not reach the store: {source}")]
    Connection {
        /// The operation that needed a connection.
        operation: String,
        /// The underlying cause.
        #[source]
        source: BackendError,
    },

    /// A record with this id is already stored.
    #[error("operation '{operation}' rejected: record {id} already exists")]
    AlreadyExists {
        /// The operation that was rejected.
        operation: String,
        /// The conflicting id.
        id: i64,
    },

    /// No record with this id is stored.
    #[error("operation '{operation}' rejected: record {id} not found")]
    NotFound {
        /// The operation that was rejected.
        operation: String,
        /// The missing id.
        id: i64,
    },

    /// A read statement failed.
    #[error("operation '{operation}' failed to read: {source}")]
    Read {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        #[source]
        source: BackendError,
    },

    /// A write failed and its transaction was rolled back.
    #[error("operation '{operation}' failed to write{}: {source}", .id.map(|id| format!(" record {id}")).unwrap_or_default())]
    Write {
        /// The operation that failed.
        operation: String,
        /// The record being written, when the failure is tied to one.
        id: Option<i64>,
        /// The underlying cause.
        #[source]
        source: BackendError,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),

    /// An ambient operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true for precondition failures (`AlreadyExists`, `NotFound`).
    ///
    /// These are detected before any write is attempted and never leave
    /// partial state behind.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::NotFound { .. })
    }

    /// Returns the record id the error refers to, if any.
    #[must_use]
    pub const fn record_id(&self) -> Option<i64> {
        match self {
            Self::AlreadyExists { id, .. } | Self::NotFound { id, .. } => Some(*id),
            Self::Write { id, .. } => *id,
            _ => None,
        }
    }
}

/// Result type alias for userstore operations.
pub type Result<T> = std::result::Result<T, Error>;
