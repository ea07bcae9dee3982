//! Audex Store - SQLite persistence for audit log entries
//!
//! Provides:
//! - SQLite schema with a checksummed migrations framework
//! - `SqliteLogStore`, a `LogEntryStore` backed by a single connection

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

pub use errors::Result;
pub use repo::SqliteLogStore;
