//! Error types for schema descriptions.

use thiserror::Error;

/// Result type alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors produced while validating a schema description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two tables share the same name.
    #[error("duplicate table '{0}'")]
    DuplicateTable(String),

    /// Two columns in one table share the same name.
    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Two indexes share the same name.
    #[error("duplicate index '{0}'")]
    DuplicateIndex(String),

    /// A table has no columns.
    #[error("table '{0}' has no columns")]
    EmptyTable(String),

    /// A primary key names a column the table does not have.
    #[error("primary key of table '{table}' references unknown column '{column}'")]
    UnknownPrimaryKeyColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// An index names a column the table does not have.
    #[error("index '{index}' on table '{table}' references unknown column '{column}'")]
    UnknownIndexColumn {
        /// Index name.
        index: String,
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
}
