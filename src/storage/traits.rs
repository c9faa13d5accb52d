//! Backend seams.
//!
//! A backend supplies a [`ConnectionSource`] that hands out [`Session`]s.
//! Everything above this layer (transactions, statement rendering, error
//! translation) is backend-independent.

use super::error::BackendError;
use super::statements::Dialect;
use super::value::SqlValue;
use crate::models::Record;

/// A single checked-out database connection.
///
/// Statements passed here are already rendered for the backend's
/// [`Dialect`]; `params` bind positionally to its placeholders. Rows returned
/// by [`Session::query_records`] must have the columns `user_id`,
/// `user_email` and `subject_id`, in that order.
pub trait Session {
    /// Backend name used in logs and metrics.
    fn backend(&self) -> &'static str;

    /// Issues a trivial round trip to confirm the connection is usable.
    fn ping(&mut self) -> Result<(), BackendError>;

    /// Runs one or more parameterless statements.
    fn batch_execute(&mut self, sql: &str) -> Result<(), BackendError>;

    /// Runs a statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BackendError>;

    /// Runs a query and maps every row to a [`Record`].
    fn query_records(&mut self, sql: &str, params: &[SqlValue])
    -> Result<Vec<Record>, BackendError>;

    /// Runs a query and reports whether it returned at least one row.
    fn query_exists(&mut self, sql: &str, params: &[SqlValue]) -> Result<bool, BackendError>;

    /// Runs a query returning a single integer (e.g. `COUNT(*)`).
    fn query_count(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64, BackendError>;
}

/// A pool of connections to one database.
pub trait ConnectionSource: Send + Sync {
    /// Backend name used in logs and metrics.
    fn backend(&self) -> &'static str;

    /// SQL dialect the backend speaks.
    fn dialect(&self) -> Dialect;

    /// Checks a connection out of the pool.
    ///
    /// The connection returns to the pool when the returned session is
    /// dropped.
    fn checkout(&self) -> Result<Box<dyn Session + '_>, BackendError>;
}
