//! Connection handling for the `SQLite` backend.
//!
//! Opening and configuring individual connections, and the `r2d2` manager
//! that validates them before they leave the pool.

use r2d2::ManageConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on a competing writer.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BACKEND: &str = "sqlite";

/// Where a `SQLite` database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    /// A private in-memory database. It lives as long as its pool; every
    /// pooled connection shares it, including replacements for discarded ones.
    Memory,
    /// A database file, created on first open if missing.
    File(PathBuf),
}

impl SqliteLocation {
    /// Returns true for [`SqliteLocation::Memory`].
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    /// Builds a connection manager that configures every connection it opens.
    #[must_use]
    pub fn manager(&self) -> SqliteManager {
        let inner = match self {
            Self::Memory => SqliteConnectionManager::memory(),
            Self::File(path) => SqliteConnectionManager::file(path),
        };
        SqliteManager {
            inner: inner.with_init(|conn| configure_connection(conn)),
        }
    }
}

/// Configures a `SQLite` connection for concurrent use.
///
/// # Configuration Applied
///
/// - **WAL mode**: readers do not block the writer (in-memory databases
///   keep their `memory` journal)
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds for a competing writer
///   instead of failing with `SQLITE_BUSY`
///
/// The write path opens transactions with `BEGIN IMMEDIATE`, so two writers
/// serialize on the busy timeout rather than deadlocking on a lock upgrade.
pub fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode returns the resulting mode as a row, which pragma_update
    // rejects for some modes; the result is not needed.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}

pub(super) fn ping(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map(|_| ())
}

/// `r2d2` manager over [`SqliteConnectionManager`].
///
/// Checkout validation is a `SELECT 1` round trip; a connection that fails it
/// is counted and discarded by the pool. A connection handed back while still
/// inside a transaction is reported broken and never reused.
#[derive(Debug)]
pub struct SqliteManager {
    inner: SqliteConnectionManager,
}

impl ManageConnection for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let conn = self.inner.connect()?;
        debug!(backend = BACKEND, "Opened pooled connection");
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        ping(conn).inspect_err(|e| {
            debug!(backend = BACKEND, error = %e, "Pre-ping failed");
            metrics::counter!("storage_pool_prepings_failed_total", "backend" => BACKEND)
                .increment(1);
        })
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        !conn.is_autocommit()
    }
}
