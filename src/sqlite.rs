use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OpenFlags, Transaction};
use tracing::{debug, info, warn};

use crate::config::SqliteConfig;
use crate::convert::{self, Conversion};
use crate::error::{DalError, Result};
use crate::types::{FieldDescriptor, FieldType, Predicate, Row, Schema, StorageType, TableSchema};

/// Opens a fresh connection for every operation. Nothing is held between
/// calls; the connection is dropped (and closed) on every exit path.
#[derive(Debug, Clone)]
struct Connector {
    path: PathBuf,
}

impl Connector {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn open(&self, create_missing: bool) -> Result<Connection> {
        // Plain paths only: the file's presence decides initialization.
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Connection::open_with_flags(&self.path, flags).map_err(|source| DalError::Connection {
            path: self.path.clone(),
            source,
        })
    }

    /// Run `f` in a transaction on a new connection, commit, then close.
    ///
    /// If `f` fails the transaction is dropped uncommitted and rolls back.
    /// Once the commit succeeds the call succeeds; a failed close is only
    /// logged.
    fn with_transaction<F, R>(&self, create_missing: bool, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R>,
    {
        let mut conn = self.open(create_missing)?;
        let tx = conn
            .transaction()
            .map_err(|source| DalError::Statement {
                statement: "BEGIN".to_string(),
                source,
            })?;
        let out = f(&tx)?;
        tx.commit().map_err(|source| DalError::Statement {
            statement: "COMMIT".to_string(),
            source,
        })?;
        if let Err((_, e)) = conn.close() {
            warn!(path = %self.path.display(), error = %e, "failed to close connection after commit");
        }
        Ok(out)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A declared column with its conversion resolved.
#[derive(Debug, Clone)]
pub struct Field {
    descriptor: FieldDescriptor,
    conversion: &'static Conversion,
}

impl Field {
    fn new(descriptor: FieldDescriptor) -> Self {
        let conversion = convert::conversion(descriptor.field_type);
        Self {
            descriptor,
            conversion,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn field_type(&self) -> FieldType {
        self.descriptor.field_type
    }

    pub fn storage(&self) -> StorageType {
        self.conversion.storage
    }

    pub fn modifier(&self) -> &str {
        &self.descriptor.modifier
    }

    fn column_definition(&self) -> String {
        let modifier = self.modifier().trim();
        let column = quote(self.name());
        if modifier.is_empty() {
            format!("{} {}", column, self.storage().sql_name())
        } else {
            format!("{} {} {}", column, self.storage().sql_name(), modifier)
        }
    }
}

/// Double-quoted identifier. Names are checked by `is_identifier` first, so
/// keywords such as `order` are the only thing quoting has to handle.
fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

fn quoted_list(names: &[&str]) -> String {
    names.iter().map(|n| quote(n)).collect::<Vec<_>>().join(", ")
}

fn insert_statement(table: &str, names: &[&str]) -> String {
    let placeholders = vec!["?"; names.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote(table),
        quoted_list(names),
        placeholders
    )
}

fn update_statement(table: &str, names: &[&str], fragment: &str) -> String {
    let assignments = names
        .iter()
        .map(|name| format!("{} = ?", quote(name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {} SET {assignments} WHERE {fragment};", quote(table))
}

fn select_statement(table: &str, names: &[&str], fragment: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {};",
        quoted_list(names),
        quote(table),
        fragment
    )
}

fn create_statement(table: &str, fields: &[Field]) -> String {
    let columns = fields
        .iter()
        .map(Field::column_definition)
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns});", quote(table))
}

/// One schema entity. Builds statements from its field list and runs each on
/// its own connection.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    fields: Vec<Field>,
    connector: Connector,
}

impl Table {
    fn new(schema: TableSchema, connector: Connector) -> Result<Self> {
        if !is_identifier(&schema.name) {
            return Err(DalError::validation(format!(
                "invalid table name '{}'",
                schema.name
            )));
        }
        if schema.fields.is_empty() {
            return Err(DalError::validation(format!(
                "table '{}' declares no fields",
                schema.name
            )));
        }
        let mut fields: Vec<Field> = Vec::with_capacity(schema.fields.len());
        for descriptor in schema.fields {
            if !is_identifier(&descriptor.name) {
                return Err(DalError::validation(format!(
                    "invalid field name '{}' in table '{}'",
                    descriptor.name, schema.name
                )));
            }
            if fields.iter().any(|f| f.name() == descriptor.name) {
                return Err(DalError::validation(format!(
                    "duplicate field '{}' in table '{}'",
                    descriptor.name, schema.name
                )));
            }
            fields.push(Field::new(descriptor));
        }
        Ok(Self {
            name: schema.name,
            fields,
            connector,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    /// Insert the declared fields present in `values` and return the new
    /// rowid. Keys that are not declared fields are ignored.
    pub fn add(&self, values: &Row) -> Result<i64> {
        let (names, params) = self.forward(values)?;
        let sql = insert_statement(&self.name, &names);
        self.connector.with_transaction(false, |tx| {
            self.execute(tx, &sql, params)?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Set the declared fields present in `values` on every row matching
    /// `predicate`. Returns the number of rows changed.
    pub fn update(&self, values: &Row, predicate: &Predicate) -> Result<usize> {
        check_predicate(predicate)?;
        let (names, mut params) = self.forward(values)?;
        params.extend(predicate.params.iter().map(|p| p.to_sql_value()));
        let sql = update_statement(&self.name, &names, &predicate.fragment);
        self.connector
            .with_transaction(false, |tx| self.execute(tx, &sql, params))
    }

    /// Read the named fields of every row matching `predicate`.
    ///
    /// Only names matter, so the keys of a value map work as well as a list.
    /// Rows come back in the engine's order.
    pub fn get<I, S>(&self, fields: I, predicate: &Predicate) -> Result<Vec<Row>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        check_predicate(predicate)?;
        let requested: Vec<S> = fields.into_iter().collect();
        let selected: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| requested.iter().any(|r| r.as_ref() == f.name()))
            .collect();
        if selected.is_empty() {
            return Err(DalError::validation(format!(
                "no declared fields of table '{}' requested",
                self.name
            )));
        }
        let names: Vec<&str> = selected.iter().map(|f| f.name()).collect();
        let sql = select_statement(&self.name, &names, &predicate.fragment);
        let params: Vec<SqlValue> = predicate.params.iter().map(|p| p.to_sql_value()).collect();

        let raw_rows = self.connector.with_transaction(false, |tx| {
            debug!(table = %self.name, statement = %sql, params = params.len(), "executing query");
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| self.statement_error(&sql, e))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    (0..names.len())
                        .map(|i| row.get::<_, SqlValue>(i))
                        .collect::<rusqlite::Result<Vec<_>>>()
                })
                .map_err(|e| self.statement_error(&sql, e))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| self.statement_error(&sql, e))?;
            Ok(rows)
        })?;

        raw_rows
            .into_iter()
            .map(|raw| {
                selected
                    .iter()
                    .zip(raw)
                    .map(|(field, stored)| {
                        let value = field.conversion.from_storage(stored)?;
                        Ok((field.name().to_string(), value))
                    })
                    .collect::<Result<Row>>()
            })
            .collect()
    }

    /// Issue this table's CREATE statement on its own connection.
    pub fn create(&self) -> Result<()> {
        self.connector.with_transaction(true, |tx| self.create_in(tx))
    }

    fn create_in(&self, tx: &Transaction<'_>) -> Result<()> {
        let sql = create_statement(&self.name, &self.fields);
        self.execute(tx, &sql, Vec::new()).map(|_| ())
    }

    /// Forward-convert the declared fields present in `values`, in schema
    /// order.
    fn forward(&self, values: &Row) -> Result<(Vec<&str>, Vec<SqlValue>)> {
        let mut names = Vec::new();
        let mut params = Vec::new();
        for field in &self.fields {
            if let Some(value) = values.get(field.name()) {
                params.push(field.conversion.to_storage(value)?);
                names.push(field.name());
            }
        }
        if names.is_empty() {
            return Err(DalError::validation(format!(
                "no declared fields of table '{}' in values",
                self.name
            )));
        }
        Ok((names, params))
    }

    fn execute(&self, tx: &Transaction<'_>, sql: &str, params: Vec<SqlValue>) -> Result<usize> {
        debug!(table = %self.name, statement = %sql, params = params.len(), "executing statement");
        tx.execute(sql, params_from_iter(params))
            .map_err(|e| self.statement_error(sql, e))
    }

    // Parameter values are left out of the log; they may hold credentials.
    fn statement_error(&self, sql: &str, source: rusqlite::Error) -> DalError {
        warn!(table = %self.name, statement = %sql, error = %source, "statement failed");
        DalError::Statement {
            statement: sql.to_string(),
            source,
        }
    }
}

fn check_predicate(predicate: &Predicate) -> Result<()> {
    if predicate.fragment.trim().is_empty() {
        return Err(DalError::validation("predicate fragment is empty"));
    }
    Ok(())
}

/// Owns the database location and one [`Table`] per declared table.
///
/// The physical schema is created when the file does not exist yet; an
/// existing file is used as-is.
#[derive(Debug)]
pub struct SqliteManager {
    path: PathBuf,
    connector: Connector,
    tables: Vec<Table>,
    by_name: HashMap<String, usize>,
}

impl SqliteManager {
    pub fn open(config: SqliteConfig) -> Result<Self> {
        Self::open_with(config.db_path, config.schema)
    }

    /// Open the database file at `path`, creating every table if the file
    /// does not exist yet.
    ///
    /// `path` is a plain filesystem path; SQLite `file:` URIs are rejected.
    pub fn open_with(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        let path = path.into();
        if path.to_string_lossy().starts_with("file:") {
            return Err(DalError::validation(format!(
                "'{}' is a URI, expected a file path",
                path.display()
            )));
        }
        if schema.tables.is_empty() {
            return Err(DalError::validation("schema declares no tables"));
        }
        let connector = Connector::new(path.clone());

        let mut tables = Vec::with_capacity(schema.tables.len());
        let mut by_name = HashMap::with_capacity(schema.tables.len());
        for table_schema in schema.tables {
            if by_name.contains_key(&table_schema.name) {
                return Err(DalError::validation(format!(
                    "duplicate table '{}'",
                    table_schema.name
                )));
            }
            let table = Table::new(table_schema, connector.clone())?;
            by_name.insert(table.name.clone(), tables.len());
            tables.push(table);
        }

        let manager = Self {
            path,
            connector,
            tables,
            by_name,
        };
        if !manager.path.is_file() {
            manager.create_database()?;
        } else {
            debug!(path = %manager.path.display(), "using existing database");
        }
        Ok(manager)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.by_name
            .get(name)
            .map(|&i| &self.tables[i])
            .ok_or_else(|| DalError::validation(format!("unknown table '{name}'")))
    }

    /// Tables in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(Table::name).collect()
    }

    /// Create every table in one transaction. A file created here is removed
    /// again on failure so the next open retries.
    fn create_database(&self) -> Result<()> {
        info!(path = %self.path.display(), tables = self.tables.len(), "creating database schema");
        let existed = self.path.exists();
        let result = self.connector.with_transaction(true, |tx| {
            for table in &self.tables {
                table.create_in(tx)?;
            }
            Ok(())
        });
        if result.is_err() && !existed && self.path.is_file() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to remove partial database");
            }
        }
        result
    }
}
