//! Connection Manager.
//!
//! Owns the connection pool for one database target, validates reachability
//! once at construction, and hands out [`ScopedConnection`]s whose return to
//! the pool is tied to `Drop`. Transactions opened on a scoped connection are
//! [`Transaction`] guards that roll back unless explicitly committed.

use super::error::BackendError;
use super::sqlite::{SqliteLocation, SqlitePool};
use super::statements::Dialect;
use super::traits::{ConnectionSource, Session};
use super::value::SqlValue;
use crate::config::StoreConfig;
use crate::models::Record;
use crate::{Error, Result};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// A parsed database target.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Sqlite(SqliteLocation),
    Postgres(String),
}

impl Target {
    /// Classifies `target` by scheme.
    ///
    /// - `sqlite::memory:`, `:memory:` → in-memory `SQLite`
    /// - `postgres://…`, `postgresql://…` → PostgreSQL
    /// - `sqlite://<path>`, `sqlite:<path>`, `<path>` → `SQLite` file
    fn parse(target: &str) -> Result<Self> {
        if target.starts_with("postgres://") || target.starts_with("postgresql://") {
            return Ok(Self::Postgres(target.to_string()));
        }

        let path = target
            .strip_prefix("sqlite://")
            .or_else(|| target.strip_prefix("sqlite:"))
            .unwrap_or(target);

        match path {
            "" => Err(Error::InvalidInput(
                "database target must name a file, ':memory:' or a postgres URL".to_string(),
            )),
            ":memory:" => Ok(Self::Sqlite(SqliteLocation::Memory)),
            path => Ok(Self::Sqlite(SqliteLocation::File(PathBuf::from(path)))),
        }
    }
}

#[cfg(feature = "postgres")]
fn postgres_source(url: &str, config: &StoreConfig) -> Result<Box<dyn ConnectionSource>> {
    let pool = super::postgres::PostgresPool::connect(
        url,
        config.pool_max_size,
        config.acquire_timeout,
    )
    .map_err(|source| Error::Connection {
        operation: "open".to_string(),
        source,
    })?;
    Ok(Box::new(pool))
}

#[cfg(not(feature = "postgres"))]
fn postgres_source(_url: &str, _config: &StoreConfig) -> Result<Box<dyn ConnectionSource>> {
    Err(Error::FeatureNotEnabled("postgres".to_string()))
}

/// Owns the connection pool for one database.
///
/// Dropping the manager closes every idle connection.
pub struct ConnectionManager {
    source: Box<dyn ConnectionSource>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("backend", &self.source.backend())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Builds a pool for `target` and probes it with one round trip.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `config` or `target` is malformed
    /// - [`Error::FeatureNotEnabled`] for a PostgreSQL target when the
    ///   `postgres` feature is off
    /// - [`Error::Connection`] if the database cannot be reached
    pub fn open(target: &str, config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let source: Box<dyn ConnectionSource> = match Target::parse(target)? {
            Target::Sqlite(location) => Box::new(SqlitePool::new(
                &location,
                config.pool_max_size,
                config.acquire_timeout,
            )),
            Target::Postgres(url) => postgres_source(&url, config)?,
        };

        let manager = Self { source };
        manager.probe()?;

        info!(
            backend = manager.backend(),
            pool_max_size = config.pool_max_size,
            "Connection manager ready"
        );
        Ok(manager)
    }

    fn probe(&self) -> Result<()> {
        let to_error = |source| Error::Connection {
            operation: "open".to_string(),
            source,
        };
        let mut conn = self.acquire().map_err(to_error)?;
        conn.ping().map_err(to_error)
    }

    /// Backend name used in logs and metrics.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.source.backend()
    }

    /// SQL dialect of the backend.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.source.dialect()
    }

    /// Checks a connection out of the pool.
    ///
    /// Waits at most the configured acquire timeout. The connection returns
    /// to the pool when the [`ScopedConnection`] is dropped.
    pub fn acquire(&self) -> std::result::Result<ScopedConnection<'_>, BackendError> {
        let session = self.source.checkout()?;
        Ok(ScopedConnection {
            session,
            dialect: self.source.dialect(),
        })
    }
}

/// A pooled connection, returned to its pool on drop.
pub struct ScopedConnection<'a> {
    session: Box<dyn Session + 'a>,
    dialect: Dialect,
}

impl<'a> ScopedConnection<'a> {
    /// Backend name used in logs and metrics.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.session.backend()
    }

    /// Issues a trivial round trip.
    pub fn ping(&mut self) -> std::result::Result<(), BackendError> {
        self.session.ping()
    }

    /// Runs parameterless statements, such as DDL.
    pub fn batch_execute(&mut self, sql: &str) -> std::result::Result<(), BackendError> {
        self.session.batch_execute(sql)
    }

    /// Runs a statement and returns the number of affected rows.
    pub fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> std::result::Result<u64, BackendError> {
        self.session.execute(sql, params)
    }

    /// Runs a query returning records.
    pub fn query_records(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> std::result::Result<Vec<Record>, BackendError> {
        self.session.query_records(sql, params)
    }

    /// Runs a query and reports whether it produced a row.
    pub fn query_exists(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> std::result::Result<bool, BackendError> {
        self.session.query_exists(sql, params)
    }

    /// Runs a query returning a single integer.
    pub fn query_count(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> std::result::Result<i64, BackendError> {
        self.session.query_count(sql, params)
    }

    /// Opens a transaction.
    ///
    /// On `SQLite` the write lock is taken immediately.
    pub fn transaction(&mut self) -> std::result::Result<Transaction<'_, 'a>, BackendError> {
        self.session.batch_execute(self.dialect.begin())?;
        Ok(Transaction {
            conn: self,
            finished: false,
        })
    }
}

/// An open transaction.
///
/// Statements run through the guard (it dereferences to the underlying
/// [`ScopedConnection`]). Dropping the guard without calling
/// [`Transaction::commit`] or [`Transaction::rollback`] rolls back.
pub struct Transaction<'c, 'a> {
    conn: &'c mut ScopedConnection<'a>,
    finished: bool,
}

impl Transaction<'_, '_> {
    /// Commits the transaction.
    ///
    /// If the commit itself fails the guard still rolls back on drop.
    pub fn commit(mut self) -> std::result::Result<(), BackendError> {
        self.conn.session.batch_execute("COMMIT")?;
        self.finished = true;
        debug!(backend = self.conn.backend(), "Transaction committed");
        Ok(())
    }

    /// Rolls the transaction back.
    pub fn rollback(mut self) -> std::result::Result<(), BackendError> {
        self.finished = true;
        self.roll_back()
    }

    fn roll_back(&mut self) -> std::result::Result<(), BackendError> {
        let backend = self.conn.backend();
        metrics::counter!("storage_transaction_rollbacks_total", "backend" => backend)
            .increment(1);
        self.conn.session.batch_execute("ROLLBACK")
    }
}

impl<'a> Deref for Transaction<'_, 'a> {
    type Target = ScopedConnection<'a>;

    fn deref(&self) -> &Self::Target {
        &*self.conn
    }
}

impl DerefMut for Transaction<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.conn
    }
}

impl Drop for Transaction<'_, '_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            backend = self.conn.backend(),
            "Transaction dropped without commit, rolling back"
        );
        if let Err(e) = self.roll_back() {
            warn!(
                backend = self.conn.backend(),
                error = %e,
                "Rollback on drop failed"
            );
        }
    }
}
