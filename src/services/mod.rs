//! Services built on the storage layer.

mod record_store;

pub use record_store::RecordStore;
