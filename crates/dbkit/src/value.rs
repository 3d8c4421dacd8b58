//! Host-side values exchanged with drivers.
//!
//! [`Value`] is the single currency between the query builder, the type
//! system and the driver boundary. Every literal a query carries ends up in a
//! `Value` before it is bound to a placeholder.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
    /// A list of values, used for `IN (...)` expansion.
    List(Vec<Value>),
}

/// How a value is handed to the driver when bound to a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Null,
    Bool,
    Int,
    Str,
    /// Large/binary object.
    Lob,
}

impl Value {
    /// Build a binary value.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// A short label naming the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::DateTimeTz(_) => "datetimetz",
            Value::Uuid(_) => "uuid",
            Value::Json(_) => "json",
            Value::List(_) => "list",
        }
    }

    /// The binding kind used when no type is known for the value.
    pub fn default_binding_kind(&self) -> BindingKind {
        match self {
            Value::Null => BindingKind::Null,
            Value::Bool(_) => BindingKind::Bool,
            Value::Int(_) => BindingKind::Int,
            Value::Bytes(_) => BindingKind::Lob,
            _ => BindingKind::Str,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Decimal(d) => d.to_string().parse().ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Render the value as a SQL literal.
    ///
    /// Only used for display (query logs) and DDL defaults; queries always
    /// bind values through placeholders.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("X'{hex}'")
            }
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(Value::to_sql_literal).collect();
                format!("({})", items.join(", "))
            }
            other => quote_string(&other.to_string()),
        }
    }
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S")),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Value::DateTimeTz(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%:z")),
            Value::Uuid(v) => write!(f, "{v}"),
            Value::Json(v) => write!(f, "{v}"),
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTimeTz(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Conversion from a [`Value`] into a concrete host type.
///
/// Used by [`Row::try_get`](crate::driver::Row::try_get).
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> DbResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> DbError {
    DbError::conversion(
        expected,
        format!("cannot read a {} value", value.kind_name()),
    )
}

impl FromValue for Value {
    fn from_value(value: &Value) -> DbResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> DbResult<Self> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|e| DbError::conversion("i32", e.to_string()))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> DbResult<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> DbResult<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Null | Value::List(_) | Value::Bytes(_) => Err(mismatch("string", value)),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(v) => Ok(Decimal::from(*v)),
            Value::String(s) => s
                .parse()
                .map_err(|e: rust_decimal::Error| DbError::conversion("decimal", e.to_string())),
            other => Err(mismatch("decimal", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::DateTimeTz(dt) => Ok(dt.naive_utc()),
            other => Err(mismatch("datetime", other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::String(s) => {
                Uuid::parse_str(s).map_err(|e| DbError::conversion("uuid", e.to_string()))
            }
            other => Err(mismatch("uuid", other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::String(s) => {
                serde_json::from_str(s).map_err(|e| DbError::conversion("json", e.to_string()))
            }
            other => Err(mismatch("json", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> DbResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_rendering_escapes_quotes() {
        assert_eq!(Value::from("it's").to_sql_literal(), "'it''s'");
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::from(true).to_sql_literal(), "TRUE");
        assert_eq!(Value::from(vec![1, 2]).to_sql_literal(), "(1, 2)");
        assert_eq!(Value::bytes(vec![0xde, 0xad]).to_sql_literal(), "X'dead'");
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3_i32)), Value::Int(3));
    }

    #[test]
    fn from_value_reads_nullable_columns() {
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(&Value::Int(7)).unwrap(), Some(7));
        assert!(i64::from_value(&Value::from("abc")).is_err());
        assert_eq!(String::from_value(&Value::Int(5)).unwrap(), "5");
    }
}
