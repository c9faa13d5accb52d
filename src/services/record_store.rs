//! Record Store.
//!
//! CRUD and search over the managed table. Every operation checks out its own
//! connection; every write runs inside one transaction that is committed on
//! success and rolled back on any failure, including precondition failures.
//!
//! Existence checks run on the same connection, inside the write transaction,
//! before the write they guard. On `SQLite` the transaction holds the write
//! lock from its first statement, so check and write cannot interleave with
//! another writer. On PostgreSQL a concurrent writer can still slip between
//! them; if the table carries a primary key, the resulting uniqueness
//! violation on `create` is reported as [`Error::AlreadyExists`].

use crate::config::StoreConfig;
use crate::models::{Record, SearchFilter};
use crate::observability::record_operation_metrics;
use crate::storage::{
    BackendError, ConnectionManager, ScopedConnection, SearchQuery, SqlValue, Statement,
    StatementSet, Transaction,
};
use crate::{Error, Result};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Transactional access to one table of records.
///
/// The store keeps no record state between calls; it is `Send + Sync` and
/// can be shared across threads behind an `Arc`.
#[derive(Debug)]
pub struct RecordStore {
    connections: ConnectionManager,
    statements: StatementSet,
    table: String,
}

fn read_failed(operation: &'static str) -> impl FnOnce(BackendError) -> Error {
    move |source| Error::Read {
        operation: operation.to_string(),
        source,
    }
}

fn write_failed(operation: &'static str, id: Option<i64>) -> impl FnOnce(BackendError) -> Error {
    move |source| Error::Write {
        operation: operation.to_string(),
        id,
        source,
    }
}

fn insert_params(record: &Record) -> [SqlValue; 3] {
    [
        record.id.into(),
        record.email.as_str().into(),
        record.subject_id.into(),
    ]
}

impl RecordStore {
    /// Opens a store on `target` with the default configuration.
    ///
    /// See [`ConnectionManager::open`] for accepted targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the database cannot be reached.
    pub fn open(target: &str) -> Result<Self> {
        Self::open_with_config(target, StoreConfig::default())
    }

    /// Opens a store on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed configuration,
    /// [`Error::Connection`] if the database cannot be reached, and
    /// [`Error::Write`] if the table cannot be created.
    pub fn open_with_config(target: &str, config: StoreConfig) -> Result<Self> {
        let connections = ConnectionManager::open(target, &config)?;
        Self::new(connections, &config)
    }

    /// Builds a store over an existing connection manager.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed configuration and
    /// [`Error::Write`] if the table cannot be created.
    pub fn new(connections: ConnectionManager, config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let store = Self {
            statements: StatementSet::new(&config.table, connections.dialect()),
            table: config.table.clone(),
            connections,
        };

        if config.create_table {
            store.ensure_table()?;
        }

        info!(
            backend = store.backend(),
            table = %store.table,
            "Record store ready"
        );
        Ok(store)
    }

    /// Backend name ("sqlite" or "postgresql").
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.connections.backend()
    }

    /// Name of the managed table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The underlying connection manager.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    fn sql(&self, statement: Statement) -> &str {
        self.statements.sql(statement)
    }

    fn ensure_table(&self) -> Result<()> {
        let mut conn = self.acquire("create_table")?;
        conn.batch_execute(self.sql(Statement::CreateTable))
            .map_err(write_failed("create_table", None))
    }

    /// Times `f` and records its outcome.
    fn observe<T>(&self, operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        let status = match &result {
            Ok(_) => "success",
            Err(e) if e.is_precondition() => "rejected",
            Err(_) => "error",
        };
        record_operation_metrics(self.backend(), operation, start, status);
        result
    }

    fn acquire(&self, operation: &'static str) -> Result<ScopedConnection<'_>> {
        self.connections
            .acquire()
            .map_err(|source| Error::Connection {
                operation: operation.to_string(),
                source,
            })
    }

    /// Runs `body` on a fresh connection, mapping store failures to
    /// [`Error::Read`].
    fn read<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&mut ScopedConnection<'_>) -> std::result::Result<T, BackendError>,
    ) -> Result<T> {
        let mut conn = self.acquire(operation)?;
        body(&mut conn).map_err(read_failed(operation))
    }

    /// Runs `body` inside a transaction: committed if it succeeds, rolled
    /// back if it fails. The error from `body` is returned unchanged.
    fn write<T>(
        &self,
        operation: &'static str,
        body: impl FnOnce(&mut Transaction<'_, '_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.acquire(operation)?;
        let mut tx = conn.transaction().map_err(write_failed(operation, None))?;

        match body(&mut tx) {
            Ok(value) => {
                tx.commit().map_err(write_failed(operation, None))?;
                debug!(operation, "Committed");
                Ok(value)
            },
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(operation, error = %rollback, "Rollback failed");
                }
                if e.is_precondition() {
                    debug!(operation, error = %e, "Rejected");
                } else {
                    warn!(operation, error = %e, "Rolled back");
                }
                Err(e)
            },
        }
    }

    fn contains(
        &self,
        conn: &mut ScopedConnection<'_>,
        id: i64,
    ) -> std::result::Result<bool, BackendError> {
        conn.query_exists(self.sql(Statement::CheckExists), &[id.into()])
    }

    fn fetch(
        &self,
        conn: &mut ScopedConnection<'_>,
        id: i64,
    ) -> std::result::Result<Option<Record>, BackendError> {
        Ok(conn
            .query_records(self.sql(Statement::Select), &[id.into()])?
            .into_iter()
            .next())
    }

    /// Reads the record `id` inside a write, or fails with `NotFound`.
    fn require(
        &self,
        tx: &mut ScopedConnection<'_>,
        operation: &'static str,
        id: i64,
    ) -> Result<Record> {
        self.fetch(tx, id)
            .map_err(write_failed(operation, Some(id)))?
            .ok_or_else(|| Error::NotFound {
                operation: operation.to_string(),
                id,
            })
    }

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if `id` is already stored, and
    /// [`Error::Write`] if the insert fails.
    #[instrument(skip(self, email), fields(operation = "create", backend = self.backend(), record.id = id))]
    pub fn create(&self, id: i64, email: &str, subject_id: i64) -> Result<u64> {
        const OP: &str = "create";
        self.observe(OP, || {
            self.write(OP, |tx| {
                if self.contains(tx, id).map_err(write_failed(OP, Some(id)))? {
                    return Err(Error::AlreadyExists {
                        operation: OP.to_string(),
                        id,
                    });
                }
                let record = Record::new(id, email, subject_id);
                tx.execute(self.sql(Statement::Insert), &insert_params(&record))
                    .map_err(|source| {
                        if source.is_unique_violation() {
                            Error::AlreadyExists {
                                operation: OP.to_string(),
                                id,
                            }
                        } else {
                            write_failed(OP, Some(id))(source)
                        }
                    })
            })
        })
    }

    /// Returns the record `id`, or `None` if it is not stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the query fails.
    #[instrument(skip(self), fields(operation = "get", backend = self.backend(), record.id = id))]
    pub fn get(&self, id: i64) -> Result<Option<Record>> {
        self.observe("get", || self.read("get", |conn| self.fetch(conn, id)))
    }

    /// Returns every record, in the order the store yields them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the query fails.
    #[instrument(skip(self), fields(operation = "get_all", backend = self.backend()))]
    pub fn get_all(&self) -> Result<Vec<Record>> {
        self.observe("get_all", || {
            self.read("get_all", |conn| {
                conn.query_records(self.sql(Statement::SelectAll), &[])
            })
        })
    }

    /// Overwrites the email and subject of record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not stored, and
    /// [`Error::Write`] if the update fails.
    #[instrument(skip(self, email), fields(operation = "update", backend = self.backend(), record.id = id))]
    pub fn update(&self, id: i64, email: &str, subject_id: i64) -> Result<u64> {
        const OP: &str = "update";
        self.observe(OP, || {
            self.write(OP, |tx| {
                if !self.contains(tx, id).map_err(write_failed(OP, Some(id)))? {
                    return Err(Error::NotFound {
                        operation: OP.to_string(),
                        id,
                    });
                }
                tx.execute(
                    self.sql(Statement::Update),
                    &[email.into(), subject_id.into(), id.into()],
                )
                .map_err(write_failed(OP, Some(id)))
            })
        })
    }

    /// Replaces the email of record `id`, keeping its subject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not stored, and
    /// [`Error::Write`] if the update fails.
    #[instrument(skip(self, email), fields(operation = "update_email", backend = self.backend(), record.id = id))]
    pub fn update_email(&self, id: i64, email: &str) -> Result<u64> {
        const OP: &str = "update_email";
        self.observe(OP, || {
            self.write(OP, |tx| {
                let current = self.require(tx, OP, id)?;
                tx.execute(
                    self.sql(Statement::Update),
                    &[email.into(), current.subject_id.into(), id.into()],
                )
                .map_err(write_failed(OP, Some(id)))
            })
        })
    }

    /// Replaces the subject of record `id`, keeping its email.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not stored, and
    /// [`Error::Write`] if the update fails.
    #[instrument(skip(self), fields(operation = "update_subject", backend = self.backend(), record.id = id))]
    pub fn update_subject(&self, id: i64, subject_id: i64) -> Result<u64> {
        const OP: &str = "update_subject";
        self.observe(OP, || {
            self.write(OP, |tx| {
                let current = self.require(tx, OP, id)?;
                tx.execute(
                    self.sql(Statement::Update),
                    &[current.email.into(), subject_id.into(), id.into()],
                )
                .map_err(write_failed(OP, Some(id)))
            })
        })
    }

    /// Deletes record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not stored, and
    /// [`Error::Write`] if the delete fails.
    #[instrument(skip(self), fields(operation = "delete", backend = self.backend(), record.id = id))]
    pub fn delete(&self, id: i64) -> Result<u64> {
        const OP: &str = "delete";
        self.observe(OP, || {
            self.write(OP, |tx| {
                if !self.contains(tx, id).map_err(write_failed(OP, Some(id)))? {
                    return Err(Error::NotFound {
                        operation: OP.to_string(),
                        id,
                    });
                }
                tx.execute(self.sql(Statement::Delete), &[id.into()])
                    .map_err(write_failed(OP, Some(id)))
            })
        })
    }

    /// Deletes every record and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the delete fails.
    #[instrument(skip(self), fields(operation = "delete_all", backend = self.backend()))]
    pub fn delete_all(&self) -> Result<u64> {
        const OP: &str = "delete_all";
        self.observe(OP, || {
            self.write(OP, |tx| {
                tx.execute(self.sql(Statement::DeleteAll), &[])
                    .map_err(write_failed(OP, None))
            })
        })
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the query fails.
    #[instrument(skip(self), fields(operation = "count", backend = self.backend()))]
    pub fn count(&self) -> Result<u64> {
        self.observe("count", || {
            let count = self.read("count", |conn| {
                conn.query_count(self.sql(Statement::Count), &[])
            })?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
    }

    /// Returns true if record `id` is stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the query fails.
    #[instrument(skip(self), fields(operation = "exists", backend = self.backend(), record.id = id))]
    pub fn exists(&self, id: i64) -> Result<bool> {
        self.observe("exists", || self.read("exists", |conn| self.contains(conn, id)))
    }

    /// Returns every record whose email equals `email` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the query fails.
    #[instrument(skip(self, email), fields(operation = "get_by_email", backend = self.backend()))]
    pub fn get_by_email(&self, email: &str) -> Result<Vec<Record>> {
        self.observe("get_by_email", || {
            self.read("get_by_email", |conn| {
                conn.query_records(self.sql(Statement::SelectByEmail), &[email.into()])
            })
        })
    }

    /// Inserts every record whose id is not yet stored, all or nothing.
    ///
    /// Ids already present are skipped. An id repeated within `records` is
    /// inserted once, from its first occurrence. Returns the number of rows
    /// inserted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] naming the failing record if any insert
    /// fails; no record from the batch is kept.
    #[instrument(skip(self, records), fields(operation = "create_batch", backend = self.backend(), count = records.len()))]
    pub fn create_batch(&self, records: &[Record]) -> Result<u64> {
        const OP: &str = "create_batch";
        self.observe(OP, || {
            if records.is_empty() {
                return Ok(0);
            }
            self.write(OP, |tx| {
                let mut inserted = 0;
                for record in records {
                    if self
                        .contains(tx, record.id)
                        .map_err(write_failed(OP, Some(record.id)))?
                    {
                        debug!(record.id = record.id, "Skipping existing record");
                        continue;
                    }
                    inserted += tx
                        .execute(self.sql(Statement::Insert), &insert_params(record))
                        .map_err(write_failed(OP, Some(record.id)))?;
                }
                Ok(inserted)
            })
        })
    }

    /// Returns every record matching `filter`.
    ///
    /// Criteria are AND-ed; an empty filter returns every record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the query fails.
    #[instrument(skip(self), fields(operation = "search", backend = self.backend()))]
    pub fn search(&self, filter: &SearchFilter) -> Result<Vec<Record>> {
        self.observe("search", || {
            let query = SearchQuery::from_filter(&self.table, self.connections.dialect(), filter);
            self.read("search", |conn| conn.query_records(query.sql(), query.params()))
        })
    }
}
