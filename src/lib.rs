//! Typed schema data-access layer over SQLite.
//!
//! # Intention
//!
//! - Map a declarative table schema onto a SQLite database.
//! - Convert abstract field values (dates, money, flags, passwords) to their
//!   stored form and back through one type-indexed registry.
//! - Provide generic add/update/get operations driven by that schema, each
//!   running one statement on its own connection.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No migrations, pooling, or multi-statement transactions.
//! - WHERE fragments are trusted caller input; values go in parameters.

pub mod config;
pub mod convert;
pub mod credential;
pub mod error;
pub mod sqlite;
pub mod types;

pub use config::SqliteConfig;
pub use credential::Credential;
pub use error::{DalError, Result};
pub use sqlite::{Field, SqliteManager, Table};
pub use types::{
    Date, FieldDescriptor, FieldType, Predicate, Row, Schema, StorageType, TableSchema, Value,
};
