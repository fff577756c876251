//! Error types for the persistence layer.

/// Errors produced by a backend or by the gateway itself.
///
/// `Clone` because a failed query is handed to its continuation by value
/// and may also be logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    /// The worker side is gone or the backend refuses connections.
    #[error("persistence backend unavailable")]
    Unavailable,

    /// The named table does not exist.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// The current row has no such column.
    #[error("no column '{0}' in result row")]
    MissingColumn(String),

    /// The column holds a value of a different type.
    #[error("column '{column}' is not {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    /// The cursor is not positioned on a row; call `next()` first.
    #[error("cursor is not on a row")]
    NoCurrentRow,

    /// Fixture data could not be parsed.
    #[error("invalid fixture: {0}")]
    Fixture(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}
