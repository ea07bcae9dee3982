//! Repository layer persisting log entries to SQLite

pub mod sqlite_log_store;

pub use sqlite_log_store::SqliteLogStore;
