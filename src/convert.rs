//! Type conversion registry.
//!
//! Every [`FieldType`] has exactly one [`Conversion`]: the SQLite storage type
//! plus a forward (application → storage) and backward (storage →
//! application) function. Tables resolve the entry once per field when they
//! are built.

use rusqlite::types::Value as SqlValue;

use crate::credential;
use crate::error::{DalError, Result};
use crate::types::{Date, FieldType, StorageType, Value};

pub type ForwardFn = fn(&Value) -> Result<SqlValue>;
pub type BackwardFn = fn(SqlValue) -> Result<Value>;

#[derive(Debug, Clone, Copy)]
pub struct Conversion {
    pub field_type: FieldType,
    pub storage: StorageType,
    pub forward: ForwardFn,
    pub backward: BackwardFn,
}

impl Conversion {
    /// Forward conversion; `Null` is stored as SQL NULL for every type.
    pub fn to_storage(&self, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            other => (self.forward)(other),
        }
    }

    /// Backward conversion; SQL NULL reads back as `Null` for every type.
    pub fn from_storage(&self, stored: SqlValue) -> Result<Value> {
        match stored {
            SqlValue::Null => Ok(Value::Null),
            other => (self.backward)(other),
        }
    }
}

// Indexed by `FieldType` discriminant.
static REGISTRY: [Conversion; 7] = [
    Conversion {
        field_type: FieldType::Bit,
        storage: StorageType::Integer,
        forward: bit_forward,
        backward: bit_backward,
    },
    Conversion {
        field_type: FieldType::Int,
        storage: StorageType::Integer,
        forward: int_forward,
        backward: int_backward,
    },
    Conversion {
        field_type: FieldType::Real,
        storage: StorageType::Real,
        forward: real_forward,
        backward: real_backward,
    },
    Conversion {
        field_type: FieldType::Text,
        storage: StorageType::Text,
        forward: text_forward,
        backward: text_backward,
    },
    Conversion {
        field_type: FieldType::Date,
        storage: StorageType::Integer,
        forward: date_forward,
        backward: date_backward,
    },
    Conversion {
        field_type: FieldType::Money,
        storage: StorageType::Integer,
        forward: money_forward,
        backward: money_backward,
    },
    Conversion {
        field_type: FieldType::Pwd,
        storage: StorageType::Blob,
        forward: pwd_forward,
        backward: pwd_backward,
    },
];

/// Registry lookup.
pub fn conversion(field_type: FieldType) -> &'static Conversion {
    &REGISTRY[field_type as usize]
}

fn unexpected(field_type: FieldType, value: &Value) -> DalError {
    DalError::conversion(field_type, format!("{} value", value.kind()))
}

fn unexpected_stored(field_type: FieldType, stored: &SqlValue) -> DalError {
    DalError::conversion(
        field_type,
        format!("stored {:?} value", stored.data_type()),
    )
}

fn f64_to_i64(field_type: FieldType, x: f64) -> Result<i64> {
    let t = x.trunc();
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Ok(t as i64)
    } else {
        Err(DalError::conversion(field_type, format!("real {x} out of integer range")))
    }
}

fn bit_forward(value: &Value) -> Result<SqlValue> {
    Ok(SqlValue::Integer(i64::from(value.is_truthy())))
}

fn bit_backward(stored: SqlValue) -> Result<Value> {
    match stored {
        SqlValue::Integer(n) => Ok(Value::Boolean(n != 0)),
        SqlValue::Real(x) => Ok(Value::Boolean(x != 0.0)),
        other => Err(unexpected_stored(FieldType::Bit, &other)),
    }
}

fn int_forward(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Integer(n) => Ok(SqlValue::Integer(*n)),
        Value::Boolean(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Real(x) => f64_to_i64(FieldType::Int, *x).map(SqlValue::Integer),
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(SqlValue::Integer)
            .map_err(|_| DalError::conversion(FieldType::Int, "non-numeric text")),
        other => Err(unexpected(FieldType::Int, other)),
    }
}

fn int_backward(stored: SqlValue) -> Result<Value> {
    match stored {
        SqlValue::Integer(n) => Ok(Value::Integer(n)),
        SqlValue::Real(x) => f64_to_i64(FieldType::Int, x).map(Value::Integer),
        other => Err(unexpected_stored(FieldType::Int, &other)),
    }
}

fn real_forward(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Real(x) => Ok(SqlValue::Real(*x)),
        Value::Integer(n) => Ok(SqlValue::Real(*n as f64)),
        Value::Boolean(b) => Ok(SqlValue::Real(if *b { 1.0 } else { 0.0 })),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(SqlValue::Real)
            .map_err(|_| DalError::conversion(FieldType::Real, "non-numeric text")),
        other => Err(unexpected(FieldType::Real, other)),
    }
}

fn real_backward(stored: SqlValue) -> Result<Value> {
    match stored {
        SqlValue::Real(x) => Ok(Value::Real(x)),
        SqlValue::Integer(n) => Ok(Value::Real(n as f64)),
        other => Err(unexpected_stored(FieldType::Real, &other)),
    }
}

fn text_forward(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Text(s) => Ok(SqlValue::Text(s.clone())),
        other => Err(unexpected(FieldType::Text, other)),
    }
}

fn text_backward(stored: SqlValue) -> Result<Value> {
    match stored {
        SqlValue::Text(s) => Ok(Value::Text(s)),
        other => Err(unexpected_stored(FieldType::Text, &other)),
    }
}

fn date_forward(value: &Value) -> Result<SqlValue> {
    let date = match value {
        Value::Date(d) => *d,
        other => return Err(unexpected(FieldType::Date, other)),
    };
    if date.year > 9999 || date.month > 99 || date.day > 99 {
        return Err(DalError::validation(format!(
            "date {date} outside year 0..=9999, month/day 0..=99"
        )));
    }
    Ok(SqlValue::Integer(date.to_storage()))
}

fn date_backward(stored: SqlValue) -> Result<Value> {
    match stored {
        SqlValue::Integer(n) => Date::from_storage(n)
            .map(Value::Date)
            .ok_or_else(|| DalError::conversion(FieldType::Date, format!("stored integer {n}"))),
        other => Err(unexpected_stored(FieldType::Date, &other)),
    }
}

/// Cents, truncated toward zero: `19.995` is stored as `1999`.
fn money_forward(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Real(x) => f64_to_i64(FieldType::Money, x * 100.0).map(SqlValue::Integer),
        Value::Integer(n) => n
            .checked_mul(100)
            .map(SqlValue::Integer)
            .ok_or_else(|| DalError::conversion(FieldType::Money, format!("integer {n} overflows cents"))),
        other => Err(unexpected(FieldType::Money, other)),
    }
}

fn money_backward(stored: SqlValue) -> Result<Value> {
    match stored {
        SqlValue::Integer(cents) => Ok(Value::Real(cents as f64 / 100.0)),
        SqlValue::Real(cents) => Ok(Value::Real(cents / 100.0)),
        other => Err(unexpected_stored(FieldType::Money, &other)),
    }
}

fn pwd_forward(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Text(password) => Ok(SqlValue::Blob(credential::encode(password))),
        Value::Blob(raw) => credential::encode_bytes(raw).map(SqlValue::Blob),
        other => Err(unexpected(FieldType::Pwd, other)),
    }
}

fn pwd_backward(stored: SqlValue) -> Result<Value> {
    match stored {
        SqlValue::Blob(blob) => credential::decode(&blob).map(Value::Credential),
        other => Err(unexpected_stored(FieldType::Pwd, &other)),
    }
}
