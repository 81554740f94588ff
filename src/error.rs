//! Error types for the persistence core
//!
//! Fatal configuration and schema errors are raised through `OrmError` and
//! propagate to the caller. Validation failures are never errors: mutating
//! operations return `Ok(false)` and accumulate messages on the record.

use thiserror::Error;

/// Result type alias for persistence operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for persistence operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrmError {
    /// Missing or invalid collaborator wiring (connection service, metadata, executor)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A metadata-declared column has no corresponding entry in the column map
    #[error("Column '{0}' isn't part of the column map")]
    ColumnMap(String),

    /// A column has no declared bind type; indicates a metadata/schema mismatch
    #[error("Column '{0}' isn't part of the table columns")]
    UnknownColumn(String),

    /// Database round-trip failed
    #[error("Database error: {0}")]
    Database(String),

    /// A resultset was indexed past its bounds
    #[error("Index {index} is out of range (resultset has {count} rows)")]
    IndexOutOfRange { index: usize, count: usize },

    /// A write was attempted against a read-only resultset
    #[error("The resultset is read-only: offsets cannot be set or unset")]
    ImmutableResultset,

    /// Malformed data passed to the deserialization entry point
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = OrmError::ColumnMap("robots_id".to_string());
        assert_eq!(err.to_string(), "Column 'robots_id' isn't part of the column map");

        let err = OrmError::IndexOutOfRange { index: 7, count: 3 };
        assert_eq!(err.to_string(), "Index 7 is out of range (resultset has 3 rows)");
    }

    #[test]
    fn test_serde_error_converts_to_serialization() {
        let bad = serde_json::from_str::<serde_json::Value>("{not json");
        let err: OrmError = bad.unwrap_err().into();
        assert!(matches!(err, OrmError::Serialization(_)));
    }
}
