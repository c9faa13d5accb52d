//! Data models for userstore.
//!
//! This module contains the record managed by the store and the filter used
//! to search it.

mod record;
mod search;

pub use record::Record;
pub use search::SearchFilter;
