//! Error types for document store operations

use thiserror::Error;

/// Errors that can occur during document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation needs a schema and the table has none
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Missing field \"{0}\"")]
    MissingField(String),

    #[error("Field \"{field}\" must be type {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// Malformed query text. `position` is a byte offset into the query.
    #[error("Query syntax error at position {position} near '{token}': {message}")]
    QuerySyntax {
        message: String,
        token: String,
        position: usize,
    },

    /// A record's `id` is already used in its table
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The id generator kept returning ids already used in the table
    #[error("Could not generate a unique id for table {0}")]
    IdExhausted(String),

    /// The durable write was rejected. The in-memory state already reflects
    /// the mutation when this is returned.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn unknown_table(table: impl Into<String>) -> Self {
        Self::UnknownTable(table.into())
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn query_syntax(
        message: impl Into<String>,
        token: impl Into<String>,
        position: usize,
    ) -> Self {
        Self::QuerySyntax {
            message: message.into(),
            token: token.into(),
            position,
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Collapse adapter-level errors into `Persistence`, leaving the rest as-is
    pub fn into_persistence(self) -> Self {
        match self {
            Self::Json(e) => Self::Persistence(format!("JSON: {}", e)),
            Self::Io(e) => Self::Persistence(format!("I/O: {}", e)),
            other => other,
        }
    }

    /// Whether this error was raised by validation of a record
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::MissingField(_) | Self::TypeMismatch { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(format!("SQL: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
