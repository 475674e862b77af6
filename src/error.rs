use std::path::PathBuf;

use thiserror::Error;

use crate::types::FieldType;

/// Errors surfaced by the data-access layer.
#[derive(Debug, Error)]
pub enum DalError {
    /// The database file could not be opened or released.
    #[error("cannot open database at {}: {source}", .path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The engine rejected or failed a statement.
    #[error("statement failed ({statement}): {source}")]
    Statement {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A password was supplied as bytes that are not valid UTF-8.
    #[error("password is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    /// The caller asked for something structurally invalid.
    #[error("validation error: {0}")]
    Validation(String),

    /// A value does not fit the declared field type, in either direction.
    #[error("cannot convert {detail} as {field_type}")]
    Conversion { field_type: FieldType, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl DalError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        DalError::Validation(msg.into())
    }

    pub(crate) fn conversion(field_type: FieldType, detail: impl Into<String>) -> Self {
        DalError::Conversion {
            field_type,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DalError>;
