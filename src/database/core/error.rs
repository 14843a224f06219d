//! Structured store errors
//!
//! Every store operation returns a [`StoreError`] carrying a [`StoreErrorKind`]
//! and a human-readable message. Driver failures are translated into kinds at
//! the storage boundary so callers never have to inspect raw SQLite codes.

use rusqlite::ffi;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error kinds surfaced by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreErrorKind {
    /// Malformed caller input (non-numeric measurement, empty path, non-positive limit)
    InvalidArgument,
    /// The referenced image capture does not exist
    UnknownCapture,
    /// Table name outside the allow-list
    UnknownTable,
    /// The image path has already been recorded
    DuplicateCapture,
    /// The storage location could not be opened or a write could not be committed
    StorageUnavailable,
}

impl std::fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StoreErrorKind::InvalidArgument => "invalid argument",
            StoreErrorKind::UnknownCapture => "unknown capture",
            StoreErrorKind::UnknownTable => "unknown table",
            StoreErrorKind::DuplicateCapture => "duplicate capture",
            StoreErrorKind::StorageUnavailable => "storage unavailable",
        };
        write!(f, "{}", s)
    }
}

/// Error type for store operations
#[derive(Debug, Clone)]
pub struct StoreError {
    /// Error kind
    pub kind: StoreErrorKind,
    /// Error message
    pub message: String,
    /// Optional details (e.g. the offending field)
    pub details: Option<Value>,
}

impl StoreError {
    /// Create a new error
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Create an error with details
    pub fn with_details(kind: StoreErrorKind, message: impl Into<String>, details: Value) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidArgument, message)
    }

    /// A measurement field that is neither absent nor a finite number
    pub fn invalid_measurement(field: &str, value: &str) -> Self {
        Self::with_details(
            StoreErrorKind::InvalidArgument,
            format!("{} must be a finite number, got '{}'", field, value),
            json!({ "field": field, "value": value }),
        )
    }

    pub fn unknown_capture(capture_id: i64) -> Self {
        Self::with_details(
            StoreErrorKind::UnknownCapture,
            format!("No image capture with id {}", capture_id),
            json!({ "capture_id": capture_id }),
        )
    }

    pub fn unknown_capture_path(path: &str) -> Self {
        Self::with_details(
            StoreErrorKind::UnknownCapture,
            format!("No image capture recorded for '{}'", path),
            json!({ "file_path": path }),
        )
    }

    pub fn unknown_table(name: &str) -> Self {
        Self::with_details(
            StoreErrorKind::UnknownTable,
            format!("Unknown table '{}'", name),
            json!({ "table": name }),
        )
    }

    pub fn duplicate_capture(path: &str) -> Self {
        Self::with_details(
            StoreErrorKind::DuplicateCapture,
            format!("Image path '{}' is already recorded", path),
            json!({ "file_path": path }),
        )
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::StorageUnavailable, message)
    }

    /// Check the error kind
    pub fn is(&self, kind: StoreErrorKind) -> bool {
        self.kind == kind
    }

    /// The field named in the details, if any
    pub fn field(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.get("field"))
            .and_then(|f| f.as_str())
    }

    /// Translate a driver error into a store error
    ///
    /// Foreign-key violations become `UnknownCapture`, uniqueness violations
    /// become `DuplicateCapture`, CHECK/NOT NULL violations become
    /// `InvalidArgument`. Everything else is `StorageUnavailable`.
    pub fn from_sqlite(err: rusqlite::Error, context: &str) -> Self {
        let message = format!("{}: {}", context, err);
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        Self::new(StoreErrorKind::UnknownCapture, message)
                    }
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Self::new(StoreErrorKind::DuplicateCapture, message)
                    }
                    ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                        Self::new(StoreErrorKind::InvalidArgument, message)
                    }
                    _ => Self::new(StoreErrorKind::StorageUnavailable, message),
                }
            }
            _ => Self::new(StoreErrorKind::StorageUnavailable, message),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::from_sqlite(err, "Storage operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn fk_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys=ON;
             CREATE TABLE parent (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);
             CREATE TABLE child (
                id INTEGER PRIMARY KEY,
                parent_id INTEGER NOT NULL REFERENCES parent(id),
                score REAL CHECK (score IS NULL OR score >= 0)
             );",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_foreign_key_violation_is_unknown_capture() {
        let conn = fk_db();
        let err = conn
            .execute("INSERT INTO child (parent_id) VALUES (999)", [])
            .unwrap_err();
        let store_err = StoreError::from_sqlite(err, "insert child");
        assert_eq!(store_err.kind, StoreErrorKind::UnknownCapture);
        assert!(store_err.message.starts_with("insert child"));
    }

    #[test]
    fn test_unique_violation_is_duplicate_capture() {
        let conn = fk_db();
        conn.execute("INSERT INTO parent (name) VALUES ('a')", [])
            .unwrap();
        let err = conn
            .execute("INSERT INTO parent (name) VALUES ('a')", [])
            .unwrap_err();
        let store_err: StoreError = err.into();
        assert_eq!(store_err.kind, StoreErrorKind::DuplicateCapture);
    }

    #[test]
    fn test_check_violation_is_invalid_argument() {
        let conn = fk_db();
        conn.execute("INSERT INTO parent (id, name) VALUES (1, 'a')", [])
            .unwrap();
        let err = conn
            .execute("INSERT INTO child (parent_id, score) VALUES (1, -1.0)", [])
            .unwrap_err();
        let store_err: StoreError = err.into();
        assert_eq!(store_err.kind, StoreErrorKind::InvalidArgument);
    }

    #[test]
    fn test_other_errors_are_storage_unavailable() {
        let conn = fk_db();
        let err = conn.execute("INSERT INTO missing VALUES (1)", []).unwrap_err();
        let store_err: StoreError = err.into();
        assert_eq!(store_err.kind, StoreErrorKind::StorageUnavailable);
    }

    #[test]
    fn test_invalid_measurement_names_field() {
        let err = StoreError::invalid_measurement("air_humidity", "wet");
        assert!(err.is(StoreErrorKind::InvalidArgument));
        assert_eq!(err.field(), Some("air_humidity"));
        assert!(err.to_string().contains("air_humidity"));
    }

    #[test]
    fn test_kind_serializes_as_code() {
        let code = serde_json::to_string(&StoreErrorKind::DuplicateCapture).unwrap();
        assert_eq!(code, "\"DUPLICATE_CAPTURE\"");
    }
}
