//! PostgreSQL backend.
//!
//! Connections come from a `deadpool-postgres` pool with verified recycling:
//! every connection is checked with a round trip before it is handed out, and
//! a broken one is replaced. The async driver is bridged to the blocking
//! [`Session`] API by a runtime the pool owns.
//!
//! Calls block the current thread and must not be made from inside an async
//! task; async callers should go through `spawn_blocking`.

use crate::models::Record;
use crate::storage::error::BackendError;
use crate::storage::statements::Dialect;
use crate::storage::traits::{ConnectionSource, Session};
use crate::storage::value::SqlValue;
use deadpool_postgres::{
    Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

const BACKEND: &str = "postgresql";

/// A pool of PostgreSQL connections plus the runtime that drives them.
pub struct PostgresPool {
    // Declared before `runtime` so connections close while it is still alive.
    pool: Pool,
    runtime: tokio::runtime::Runtime,
}

impl PostgresPool {
    /// Builds the pool. No connection is opened until the first checkout.
    pub fn connect(
        url: &str,
        max_size: usize,
        acquire_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("userstore-postgres")
            .enable_all()
            .build()
            .map_err(BackendError::Runtime)?;

        let pool = {
            let _guard = runtime.enter();
            Self::build_config(url, max_size, acquire_timeout)
                .create_pool(Some(Runtime::Tokio1), NoTls)?
        };

        Ok(Self { pool, runtime })
    }

    /// Builds a deadpool config.
    ///
    /// Waiting for a free slot, opening a connection, and verifying a
    /// recycled one are each bounded by `acquire_timeout`.
    fn build_config(url: &str, max_size: usize, acquire_timeout: Duration) -> Config {
        let mut cfg = Config::new();
        cfg.url = Some(url.to_string());
        cfg.pool = Some(PoolConfig {
            max_size,
            timeouts: Timeouts {
                wait: Some(acquire_timeout),
                create: Some(acquire_timeout),
                recycle: Some(acquire_timeout),
            },
            ..Default::default()
        });
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Verified,
        });
        cfg
    }
}

impl ConnectionSource for PostgresPool {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn checkout(&self) -> Result<Box<dyn Session + '_>, BackendError> {
        let client = self.runtime.block_on(self.pool.get())?;
        Ok(Box::new(PgSession {
            client,
            runtime: &self.runtime,
        }))
    }
}

/// A checked-out PostgreSQL connection.
struct PgSession<'a> {
    client: Object,
    runtime: &'a tokio::runtime::Runtime,
}

fn bind(values: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    values
        .iter()
        .map(|value| match value {
            SqlValue::Integer(v) => v as &(dyn ToSql + Sync),
            SqlValue::Text(v) => v as &(dyn ToSql + Sync),
        })
        .collect()
}

fn to_record(row: &tokio_postgres::Row) -> Result<Record, tokio_postgres::Error> {
    Ok(Record::new(
        row.try_get::<_, i64>(0)?,
        row.try_get::<_, String>(1)?,
        row.try_get::<_, i64>(2)?,
    ))
}

impl Session for PgSession<'_> {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn ping(&mut self) -> Result<(), BackendError> {
        self.batch_execute("SELECT 1")
    }

    fn batch_execute(&mut self, sql: &str) -> Result<(), BackendError> {
        let client = &self.client;
        Ok(self.runtime.block_on(client.batch_execute(sql))?)
    }

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BackendError> {
        let client = &self.client;
        let params = bind(params);
        Ok(self.runtime.block_on(async {
            let statement = client.prepare_cached(sql).await?;
            client.execute(&statement, &params).await
        })?)
    }

    fn query_records(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Vec<Record>, BackendError> {
        let client = &self.client;
        let params = bind(params);
        Ok(self.runtime.block_on(async {
            let statement = client.prepare_cached(sql).await?;
            let rows = client.query(&statement, &params).await?;
            rows.iter()
                .map(to_record)
                .collect::<Result<Vec<_>, _>>()
        })?)
    }

    fn query_exists(&mut self, sql: &str, params: &[SqlValue]) -> Result<bool, BackendError> {
        let client = &self.client;
        let params = bind(params);
        Ok(self.runtime.block_on(async {
            let statement = client.prepare_cached(sql).await?;
            client
                .query_opt(&statement, &params)
                .await
                .map(|row| row.is_some())
        })?)
    }

    fn query_count(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64, BackendError> {
        let client = &self.client;
        let params = bind(params);
        Ok(self.runtime.block_on(async {
            let statement = client.prepare_cached(sql).await?;
            client.query_one(&statement, &params).await?.try_get(0)
        })?)
    }
}
