use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value as SqlValue;
use serde::Deserialize;

use crate::credential::Credential;
use crate::error::DalError;

/// Application-level values, before forward conversion and after backward
/// conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(Date),
    Credential(Credential),
}

impl Value {
    /// Truthiness used by `bit` fields.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Real(x) => *x != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Blob(b) => !b.is_empty(),
            Value::Date(_) | Value::Credential(_) => true,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_credential(&self) -> Option<&Credential> {
        match self {
            Value::Credential(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short description used in conversion errors; never includes the value
    /// itself.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
            Value::Date(_) => "date",
            Value::Credential(_) => "credential",
        }
    }

    /// Storage form of a predicate parameter, bound without consulting any
    /// field type.
    pub(crate) fn to_sql_value(&self) -> SqlValue {
        match self {
            Value::Null => SqlValue::Null,
            Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
            Value::Integer(n) => SqlValue::Integer(*n),
            Value::Real(x) => SqlValue::Real(*x),
            Value::Text(s) => SqlValue::Text(s.clone()),
            Value::Blob(b) => SqlValue::Blob(b.clone()),
            Value::Date(d) => SqlValue::Integer(d.to_storage()),
            Value::Credential(c) => SqlValue::Blob(c.to_bytes()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Blob(b)
    }
}

impl From<Date> for Value {
    fn from(d: Date) -> Self {
        Value::Date(d)
    }
}

impl From<Credential> for Value {
    fn from(c: Credential) -> Self {
        Value::Credential(c)
    }
}

/// A calendar-free (year, month, day) triple.
///
/// No calendar validation is performed: `(2023, 2, 31)` is a valid `Date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub const fn new(year: u16, month: u8, day: u8) -> Self {
        Self { year, month, day }
    }

    /// `year * 10^4 + month * 10^2 + day`
    pub fn to_storage(self) -> i64 {
        i64::from(self.year) * 10_000 + i64::from(self.month) * 100 + i64::from(self.day)
    }

    /// Inverse of [`Date::to_storage`]; `None` when `encoded` is outside
    /// `0..=99_999_999`.
    pub fn from_storage(encoded: i64) -> Option<Self> {
        if !(0..=99_999_999).contains(&encoded) {
            return None;
        }
        Some(Self {
            year: (encoded / 10_000) as u16,
            month: (encoded / 100 % 100) as u8,
            day: (encoded % 100) as u8,
        })
    }
}

impl From<(u16, u8, u8)> for Date {
    fn from((year, month, day): (u16, u8, u8)) -> Self {
        Self::new(year, month, day)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Abstract field types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bit,
    Int,
    Real,
    Text,
    Date,
    Money,
    Pwd,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::Bit,
        FieldType::Int,
        FieldType::Real,
        FieldType::Text,
        FieldType::Date,
        FieldType::Money,
        FieldType::Pwd,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::Bit => "bit",
            FieldType::Int => "int",
            FieldType::Real => "real",
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Money => "money",
            FieldType::Pwd => "pwd",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = DalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                DalError::validation(format!(
                    "unknown field type '{s}', expected bit|int|real|text|date|money|pwd"
                ))
            })
    }
}

/// SQLite column types that abstract field types are stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Integer,
    Text,
    Real,
    Blob,
}

impl StorageType {
    pub const fn sql_name(self) -> &'static str {
        match self {
            StorageType::Integer => "integer",
            StorageType::Text => "text",
            StorageType::Real => "real",
            StorageType::Blob => "blob",
        }
    }
}

/// One declared column: name, abstract type and the raw modifier text
/// appended to its column definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub modifier: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType, modifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type,
            modifier: modifier.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        modifier: impl Into<String>,
    ) -> Self {
        self.fields
            .push(FieldDescriptor::new(name, field_type, modifier));
        self
    }
}

/// Schema definition for the SQLite database
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Schema {
    pub tables: Vec<TableSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }
}

/// A WHERE fragment plus its positional parameters.
///
/// The fragment is inserted verbatim after `WHERE`; untrusted input belongs
/// in `params` only.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub fragment: String,
    pub params: Vec<Value>,
}

impl Predicate {
    pub fn new(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn with_params<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }
}

/// One row of application values keyed by field name.
pub type Row = HashMap<String, Value>;
