//! Storage-boundary values.
//!
//! # Responsibility
//! - Carry typed filter values and column values across both SQL engines.
//! - Define the SQLite storage encoding for booleans, UUIDs and timestamps.
//!
//! # Invariants
//! - `to_storage()` only ever yields `Null`, `Integer`, `Real` or `Text`.
//! - Timestamps are stored as RFC 3339 text with microseconds and a `Z`
//!   suffix, so text order equals chronological order.

use super::schema::ColumnKind;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Error raised while mapping stored values onto record fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Stored value does not match the declared column kind.
    TypeMismatch {
        column: String,
        expected: ColumnKind,
        found: &'static str,
    },
    /// Value is structurally the right kind but cannot be parsed.
    InvalidValue { column: String, message: String },
    /// Column was not part of the fetched row.
    MissingColumn(String),
    /// Record produced a value for a column its schema does not declare.
    UnknownColumn { record: String, column: String },
    /// Identifier is not a version-4 UUID.
    InvalidId(Uuid),
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "column `{column}` expected {expected:?} value, found {found}"
            ),
            Self::InvalidValue { column, message } => {
                write!(f, "invalid value in column `{column}`: {message}")
            }
            Self::MissingColumn(column) => write!(f, "column `{column}` missing from row"),
            Self::UnknownColumn { record, column } => {
                write!(f, "'{record}' has no column '{column}'")
            }
            Self::InvalidId(id) => write!(f, "id must be a UUID version 4, got {id}"),
        }
    }
}

impl Error for RecordError {}

/// A value crossing the storage boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Lowers typed variants to the four SQLite storage classes.
    pub fn to_storage(&self) -> SqlValue {
        match self {
            Self::Bool(value) => Self::Integer(i64::from(*value)),
            Self::Uuid(value) => Self::Text(value.hyphenated().to_string()),
            Self::Timestamp(value) => Self::Text(format_timestamp(value)),
            other => other.clone(),
        }
    }

    /// Lifts a raw storage value into the typed variant for `kind`.
    pub fn decode(column: &str, kind: ColumnKind, raw: SqlValue) -> Result<SqlValue, RecordError> {
        let mismatch = |found: &SqlValue| RecordError::TypeMismatch {
            column: column.to_string(),
            expected: kind,
            found: found.storage_class(),
        };

        match (kind, raw) {
            (_, SqlValue::Null) => Ok(SqlValue::Null),
            (ColumnKind::Text, SqlValue::Text(value)) => Ok(SqlValue::Text(value)),
            (ColumnKind::Integer, SqlValue::Integer(value)) => Ok(SqlValue::Integer(value)),
            (ColumnKind::Real, SqlValue::Real(value)) => Ok(SqlValue::Real(value)),
            (ColumnKind::Real, SqlValue::Integer(value)) => Ok(SqlValue::Real(value as f64)),
            (ColumnKind::Boolean, SqlValue::Integer(0)) => Ok(SqlValue::Bool(false)),
            (ColumnKind::Boolean, SqlValue::Integer(1)) => Ok(SqlValue::Bool(true)),
            (ColumnKind::Uuid, SqlValue::Text(value)) => Uuid::parse_str(&value)
                .map(SqlValue::Uuid)
                .map_err(|err| RecordError::InvalidValue {
                    column: column.to_string(),
                    message: format!("`{value}` is not a uuid: {err}"),
                }),
            (ColumnKind::Timestamp, SqlValue::Text(value)) => DateTime::parse_from_rfc3339(&value)
                .map(|parsed| SqlValue::Timestamp(parsed.with_timezone(&Utc)))
                .map_err(|err| RecordError::InvalidValue {
                    column: column.to_string(),
                    message: format!("`{value}` is not an RFC 3339 timestamp: {err}"),
                }),
            (_, other) => Err(mismatch(&other)),
        }
    }

    fn storage_class(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Bool(_) => "boolean",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl Display for SqlValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Uuid(value) => write!(f, "{value}"),
            Self::Timestamp(value) => f.write_str(&format_timestamp(value)),
        }
    }
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self.to_storage() {
            SqlValue::Integer(value) => Value::Integer(value),
            SqlValue::Real(value) => Value::Real(value),
            SqlValue::Text(value) => Value::Text(value),
            _ => Value::Null,
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(value) => Self::Integer(value),
            Value::Real(value) => Self::Real(value),
            Value::Text(value) => Self::Text(value),
            Value::Blob(bytes) => Self::Text(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Typed extraction from a decoded [`SqlValue`].
pub trait FromSqlValue: Sized {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError>;
}

fn unexpected(column: &str, expected: ColumnKind, value: &SqlValue) -> RecordError {
    RecordError::TypeMismatch {
        column: column.to_string(),
        expected,
        found: value.storage_class(),
    }
}

impl FromSqlValue for String {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError> {
        match value {
            SqlValue::Text(text) => Ok(text.clone()),
            other => Err(unexpected(column, ColumnKind::Text, other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError> {
        match value {
            SqlValue::Integer(number) => Ok(*number),
            other => Err(unexpected(column, ColumnKind::Integer, other)),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError> {
        match value {
            SqlValue::Real(number) => Ok(*number),
            SqlValue::Integer(number) => Ok(*number as f64),
            other => Err(unexpected(column, ColumnKind::Real, other)),
        }
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError> {
        match value {
            SqlValue::Bool(flag) => Ok(*flag),
            other => Err(unexpected(column, ColumnKind::Boolean, other)),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError> {
        match value {
            SqlValue::Uuid(id) => Ok(*id),
            other => Err(unexpected(column, ColumnKind::Uuid, other)),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError> {
        match value {
            SqlValue::Timestamp(ts) => Ok(*ts),
            other => Err(unexpected(column, ColumnKind::Timestamp, other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(column: &str, value: &SqlValue) -> Result<Self, RecordError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_sql_value(column, value).map(Some)
    }
}
