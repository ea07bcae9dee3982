//! Error handling for audex-store
//!
//! Store failures are reported as `ExError`; they reach callers of the
//! `LogEntryStore` trait wrapped in `AuditError::Store`.

use audex_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::ConstraintViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Create an error for a stored row that cannot be decoded
pub fn corrupt_row(entry_id: i64, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Serialization)
        .with_op("log_entry_decode")
        .with_entity(format!("log_entry:{}", entry_id))
        .with_message(reason.to_string())
}

/// Create an error for an update of an entry that was never inserted
pub fn not_stored(op: &str) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op(op.to_string())
        .with_message("Log entry has not been inserted")
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_is_constraint_violation() {
        let err = checksum_mismatch("001_log_entries", "aa", "bb");
        assert_eq!(err.kind(), ExErrorKind::ConstraintViolation);
        assert!(err.message().contains("001_log_entries"));
    }

    #[test]
    fn test_corrupt_row_names_entry() {
        let err = corrupt_row(7, "bad timestamp");
        assert_eq!(err.code(), "ERR_SERIALIZATION");
        assert_eq!(err.entity(), Some("log_entry:7"));
    }
}
