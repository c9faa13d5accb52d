//! `SQLite` backend.
//!
//! - [`connection`]: opening and configuring connections, checkout validation
//! - [`pool`]: the bounded, pre-pinging connection pool

mod connection;
mod pool;

pub use connection::{BUSY_TIMEOUT, SqliteLocation, SqliteManager, configure_connection};
pub use pool::{PooledConnection, SqlitePool};
