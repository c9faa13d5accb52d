//! Storage layer.
//!
//! - [`connection`]: the Connection Manager, scoped connections and
//!   transaction guards
//! - [`sqlite`] and `postgres`: backends behind the [`traits`] seams
//! - [`statements`] and [`search`]: the SQL the Record Store issues
//!
//! Backends see only rendered SQL and [`SqlValue`] parameters; the domain
//! lives in [`crate::services`].

// Dropping pooled connections slightly early provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod connection;
pub mod error;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod search;
pub mod sqlite;
pub mod statements;
pub mod traits;
pub mod value;

pub use connection::{ConnectionManager, ScopedConnection, Transaction};
pub use error::BackendError;
pub use search::{PredicateBuilder, SearchQuery};
pub use statements::{Column, Dialect, Statement, StatementSet, is_valid_identifier};
pub use traits::{ConnectionSource, Session};
pub use value::SqlValue;
