//! Connection pool for the `SQLite` backend.
//!
//! An `r2d2` pool over [`SqliteManager`]. Connections are opened lazily up to
//! the configured size and pre-pinged on checkout. A checkout waits at most
//! the acquire timeout. A connection dropped mid-transaction is rolled back
//! before it returns to the pool.

use super::connection::{SqliteLocation, SqliteManager, ping};
use crate::config::StoreConfig;
use crate::models::Record;
use crate::storage::error::BackendError;
use crate::storage::statements::Dialect;
use crate::storage::traits::{ConnectionSource, Session};
use crate::storage::value::SqlValue;
use r2d2::{HandleError, Pool};
use rusqlite::types::ToSqlOutput;
use rusqlite::{ToSql, params_from_iter};
use std::time::Duration;
use tracing::warn;

const BACKEND: &str = "sqlite";

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Integer(value) => ToSqlOutput::from(*value),
            Self::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

/// Routes pool-internal errors (failed opens, failed pre-pings) to `tracing`.
#[derive(Debug)]
struct TracingErrorHandler;

impl HandleError<rusqlite::Error> for TracingErrorHandler {
    fn handle_error(&self, error: rusqlite::Error) {
        warn!(backend = BACKEND, error = %error, "SQLite pool error");
    }
}

/// A bounded pool of `SQLite` connections.
pub struct SqlitePool {
    pool: Pool<SqliteManager>,
    acquire_timeout: Duration,
}

impl SqlitePool {
    /// Creates a pool. No connection is opened until the first checkout.
    ///
    /// A pool over [`SqliteLocation::Memory`] holds a single connection
    /// regardless of `max_size`. `acquire_timeout` is clamped to
    /// [`StoreConfig::MAX_ACQUIRE_TIMEOUT`].
    #[must_use]
    pub fn new(location: &SqliteLocation, max_size: usize, acquire_timeout: Duration) -> Self {
        let max_size = if location.is_memory() {
            1
        } else {
            u32::try_from(max_size).unwrap_or(u32::MAX).max(1)
        };
        let acquire_timeout = acquire_timeout.clamp(
            StoreConfig::MIN_ACQUIRE_TIMEOUT,
            StoreConfig::MAX_ACQUIRE_TIMEOUT,
        );

        let pool = Pool::builder()
            .max_size(max_size)
            .min_idle(Some(0))
            .test_on_check_out(true)
            .connection_timeout(acquire_timeout)
            .error_handler(Box::new(TracingErrorHandler))
            .build_unchecked(location.manager());

        Self {
            pool,
            acquire_timeout,
        }
    }

    /// Maximum number of open connections.
    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.pool.max_size()
    }

    /// Checks a connection out, waiting up to the acquire timeout.
    pub fn get(&self) -> Result<PooledConnection, BackendError> {
        let conn = self.pool.get().map_err(|source| {
            metrics::counter!("storage_pool_timeouts_total", "backend" => BACKEND).increment(1);
            BackendError::PoolTimeout {
                timeout: self.acquire_timeout,
                source,
            }
        })?;
        Ok(PooledConnection { conn })
    }
}

impl ConnectionSource for SqlitePool {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn checkout(&self) -> Result<Box<dyn Session + '_>, BackendError> {
        Ok(Box::new(self.get()?))
    }
}

/// A connection checked out of a [`SqlitePool`]; returned on drop.
pub struct PooledConnection {
    conn: r2d2::PooledConnection<SqliteManager>,
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // Anything still open here was abandoned; the pool discards the
        // connection if the rollback does not take.
        if !self.conn.is_autocommit()
            && let Err(e) = self.conn.execute_batch("ROLLBACK")
        {
            warn!(backend = BACKEND, error = %e, "Discarding pooled connection left in a transaction");
        }
    }
}

impl Session for PooledConnection {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn ping(&mut self) -> Result<(), BackendError> {
        Ok(ping(&self.conn)?)
    }

    fn batch_execute(&mut self, sql: &str) -> Result<(), BackendError> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BackendError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let affected = stmt.execute(params_from_iter(params))?;
        Ok(affected as u64)
    }

    fn query_records(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>, BackendError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok(Record::new(row.get(0)?, row.get::<_, String>(1)?, row.get(2)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_exists(&mut self, sql: &str, params: &[SqlValue]) -> Result<bool, BackendError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.exists(params_from_iter(params))?)
    }

    fn query_count(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64, BackendError> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.query_row(params_from_iter(params), |row| row.get(0))?)
    }
}
