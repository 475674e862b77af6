use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::types::Schema;

/// SQLite manager configuration
///
/// Deserializes from JSON shaped like:
///
/// ```json
/// {
///   "db_path": "app.db",
///   "schema": { "tables": [
///     { "name": "users", "fields": [
///       { "name": "id", "type": "int", "modifier": "PRIMARY KEY" },
///       { "name": "name", "type": "text" }
///     ] }
///   ] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// Tables to create when the file does not exist yet
    pub schema: Schema,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            schema,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}
