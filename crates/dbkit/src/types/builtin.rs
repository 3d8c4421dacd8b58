//! Built-in type implementations.

use super::SqlType;
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::value::{BindingKind, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

fn cannot_convert(value: &Value, target: &str) -> DbError {
    DbError::invalid_argument(format!(
        "Cannot convert value of type `{}` to {target}",
        value.kind_name()
    ))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn decimal_to_i64(d: &Decimal) -> Option<i64> {
    d.trunc().to_string().parse().ok()
}

/// `integer`, `biginteger`, `smallinteger` and `tinyinteger`.
#[derive(Debug, Clone)]
pub struct IntegerType {
    name: &'static str,
}

impl IntegerType {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }

    fn numeric(&self, value: &Value) -> Option<i64> {
        match value {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            Value::Decimal(d) => decimal_to_i64(d),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            _ => None,
        }
    }
}

impl SqlType for IntegerType {
    fn name(&self) -> &str {
        self.name
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if is_blank(value) {
            return Ok(Value::Null);
        }
        self.numeric(value)
            .map(Value::Int)
            .ok_or_else(|| cannot_convert(value, "integer"))
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.numeric(value)
            .map(Value::Int)
            .ok_or_else(|| DbError::conversion(self.name, format!("not numeric: {value}")))
    }

    fn binding_kind(&self, value: &Value, _dialect: &dyn Dialect) -> BindingKind {
        if value.is_null() {
            BindingKind::Null
        } else {
            BindingKind::Int
        }
    }

    fn marshal(&self, value: &Value) -> Value {
        if is_blank(value) {
            return Value::Null;
        }
        self.numeric(value).map_or(Value::Null, Value::Int)
    }
}

/// `float`
#[derive(Debug, Clone, Copy)]
pub struct FloatType;

impl SqlType for FloatType {
    fn name(&self) -> &str {
        "float"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if is_blank(value) {
            return Ok(Value::Null);
        }
        match value {
            Value::List(_) | Value::Json(_) | Value::Bytes(_) => Err(cannot_convert(value, "float")),
            other => other
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| cannot_convert(other, "float")),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        value
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| DbError::conversion("float", format!("not numeric: {value}")))
    }

    fn marshal(&self, value: &Value) -> Value {
        if is_blank(value) {
            return Value::Null;
        }
        value.as_f64().map_or(Value::Null, Value::Float)
    }
}

/// `decimal`, exchanged as [`Decimal`] on the host side.
#[derive(Debug, Clone, Copy)]
pub struct DecimalType;

impl DecimalType {
    fn parse(value: &Value) -> Option<Decimal> {
        match value {
            Value::Decimal(d) => Some(*d),
            Value::Int(v) => Some(Decimal::from(*v)),
            Value::Float(v) => Decimal::try_from(*v).ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl SqlType for DecimalType {
    fn name(&self) -> &str {
        "decimal"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if is_blank(value) {
            return Ok(Value::Null);
        }
        Self::parse(value)
            .map(Value::Decimal)
            .ok_or_else(|| cannot_convert(value, "decimal"))
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Self::parse(value)
            .map(Value::Decimal)
            .ok_or_else(|| DbError::conversion("decimal", format!("not numeric: {value}")))
    }

    fn marshal(&self, value: &Value) -> Value {
        if is_blank(value) {
            return Value::Null;
        }
        Self::parse(value).map_or(Value::Null, Value::Decimal)
    }
}

/// `boolean`
#[derive(Debug, Clone, Copy)]
pub struct BoolType;

impl SqlType for BoolType {
    fn name(&self) -> &str {
        "boolean"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(v) => Ok(Value::Bool(*v)),
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            Value::String(s) if s == "0" => Ok(Value::Bool(false)),
            Value::String(s) if s == "1" => Ok(Value::Bool(true)),
            other => Err(cannot_convert(other, "bool")),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::Bool(v) => Value::Bool(*v),
            Value::Int(v) => Value::Bool(*v != 0),
            Value::Float(v) => Value::Bool(*v != 0.0),
            Value::String(s) => match s.parse::<f64>() {
                Ok(n) => Value::Bool(n != 0.0),
                Err(_) => Value::Bool(matches!(s.to_lowercase().as_str(), "true" | "t")),
            },
            other => {
                return Err(DbError::conversion(
                    "boolean",
                    format!("cannot read a {} value", other.kind_name()),
                ));
            }
        })
    }

    fn binding_kind(&self, value: &Value, _dialect: &dyn Dialect) -> BindingKind {
        if value.is_null() {
            BindingKind::Null
        } else {
            BindingKind::Bool
        }
    }

    fn marshal(&self, value: &Value) -> Value {
        match value {
            Value::Bool(v) => Value::Bool(*v),
            Value::Int(1) => Value::Bool(true),
            Value::Int(0) => Value::Bool(false),
            Value::String(s) => match s.to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Value::Bool(true),
                "0" | "false" | "off" | "no" => Value::Bool(false),
                _ => Value::Null,
            },
            _ => Value::Null,
        }
    }
}

/// `string`, `char` and `text`.
#[derive(Debug, Clone)]
pub struct StringType {
    name: &'static str,
}

impl StringType {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl SqlType for StringType {
    fn name(&self) -> &str {
        self.name
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Bool(true) => Ok(Value::String("1".to_string())),
            Value::Bool(false) => Ok(Value::String(String::new())),
            Value::List(_) | Value::Json(_) | Value::Bytes(_) => {
                Err(cannot_convert(value, "string"))
            }
            other => Ok(Value::String(other.to_string())),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        })
    }

    fn marshal(&self, value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::List(_) | Value::Json(_) => Value::String(String::new()),
            Value::String(s) => Value::String(s.clone()),
            other => Value::String(other.to_string()),
        }
    }
}

/// `binary`
#[derive(Debug, Clone, Copy)]
pub struct BinaryType;

impl SqlType for BinaryType {
    fn name(&self) -> &str {
        "binary"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
            Value::String(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
            other => Err(cannot_convert(other, "binary")),
        }
    }

    fn to_host(&self, value: &Value, dialect: &dyn Dialect) -> DbResult<Value> {
        self.to_database(value, dialect)
            .map_err(|e| DbError::conversion("binary", e.to_string()))
    }

    fn binding_kind(&self, value: &Value, _dialect: &dyn Dialect) -> BindingKind {
        if value.is_null() {
            BindingKind::Null
        } else {
            BindingKind::Lob
        }
    }

    fn marshal(&self, value: &Value) -> Value {
        value.clone()
    }
}

fn parse_uuid(value: &Value) -> Option<Uuid> {
    match value {
        Value::Uuid(u) => Some(*u),
        Value::String(s) => Uuid::parse_str(s.trim()).ok(),
        Value::Bytes(b) => Uuid::from_slice(b).ok(),
        _ => None,
    }
}

/// `uuid`, stored as its 36-character text form.
#[derive(Debug, Clone, Copy)]
pub struct UuidType;

impl SqlType for UuidType {
    fn name(&self) -> &str {
        "uuid"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            v if is_blank(v) => Ok(Value::Null),
            Value::Uuid(u) => Ok(Value::String(u.to_string())),
            Value::String(s) => Ok(Value::String(s.clone())),
            other => Err(cannot_convert(other, "uuid")),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(parse_uuid(value).map_or_else(|| Value::String(value.to_string()), Value::Uuid))
    }

    fn marshal(&self, value: &Value) -> Value {
        if is_blank(value) {
            return Value::Null;
        }
        value.clone()
    }

    fn new_id(&self) -> Option<Value> {
        Some(Value::Uuid(Uuid::new_v4()))
    }
}

/// `binaryuuid`, stored as 16 raw bytes.
#[derive(Debug, Clone, Copy)]
pub struct BinaryUuidType;

impl SqlType for BinaryUuidType {
    fn name(&self) -> &str {
        "binaryuuid"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if is_blank(value) {
            return Ok(Value::Null);
        }
        parse_uuid(value)
            .map(|u| Value::Bytes(u.as_bytes().to_vec()))
            .ok_or_else(|| cannot_convert(value, "binaryuuid"))
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        parse_uuid(value)
            .map(Value::Uuid)
            .ok_or_else(|| DbError::conversion("binaryuuid", "expected 16 bytes"))
    }

    fn binding_kind(&self, value: &Value, _dialect: &dyn Dialect) -> BindingKind {
        if value.is_null() {
            BindingKind::Null
        } else {
            BindingKind::Lob
        }
    }

    fn marshal(&self, value: &Value) -> Value {
        if is_blank(value) {
            return Value::Null;
        }
        value.clone()
    }

    fn new_id(&self) -> Option<Value> {
        Some(Value::Uuid(Uuid::new_v4()))
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

fn is_zero_date(s: &str) -> bool {
    s.starts_with("0000-00-00")
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_utc_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_datetime(s).map(|dt| dt.and_utc()))
}

/// `date`
#[derive(Debug, Clone, Copy)]
pub struct DateType;

impl DateType {
    fn parse(value: &Value) -> Option<NaiveDate> {
        match value {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            Value::DateTimeTz(dt) => Some(dt.date_naive()),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .ok()
                .or_else(|| parse_naive_datetime(s).map(|dt| dt.date())),
            Value::Int(ts) => DateTime::from_timestamp(*ts, 0).map(|dt| dt.date_naive()),
            _ => None,
        }
    }
}

impl SqlType for DateType {
    fn name(&self) -> &str {
        "date"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value.clone()),
            other => Self::parse(other)
                .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
                .ok_or_else(|| cannot_convert(other, "date")),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if is_zero_date(s) => Ok(Value::Null),
            other => Self::parse(other)
                .map(Value::Date)
                .ok_or_else(|| DbError::conversion("date", format!("unparseable: {other}"))),
        }
    }

    fn marshal(&self, value: &Value) -> Value {
        Self::parse(value).map_or(Value::Null, Value::Date)
    }
}

/// `time`
#[derive(Debug, Clone, Copy)]
pub struct TimeType;

impl TimeType {
    fn parse(value: &Value) -> Option<NaiveTime> {
        match value {
            Value::Time(t) => Some(*t),
            Value::DateTime(dt) => Some(dt.time()),
            Value::DateTimeTz(dt) => Some(dt.time()),
            Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M"))
                .ok(),
            _ => None,
        }
    }
}

impl SqlType for TimeType {
    fn name(&self) -> &str {
        "time"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value.clone()),
            other => Self::parse(other)
                .map(|t| Value::String(t.format(TIME_FORMAT).to_string()))
                .ok_or_else(|| cannot_convert(other, "time")),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Self::parse(value)
            .map(Value::Time)
            .ok_or_else(|| DbError::conversion("time", format!("unparseable: {value}")))
    }

    fn marshal(&self, value: &Value) -> Value {
        Self::parse(value).map_or(Value::Null, Value::Time)
    }
}

/// `datetime`, `datetimefractional`, `timestamp`, `timestampfractional` and
/// `timestamptimezone`.
///
/// Values without an offset are treated as UTC.
#[derive(Debug, Clone)]
pub struct DateTimeType {
    name: &'static str,
    fractional: bool,
    timezone: bool,
}

impl DateTimeType {
    pub fn datetime() -> Self {
        Self { name: "datetime", fractional: false, timezone: false }
    }

    pub fn datetime_fractional() -> Self {
        Self { name: "datetimefractional", fractional: true, timezone: false }
    }

    pub fn timestamp() -> Self {
        Self { name: "timestamp", fractional: false, timezone: false }
    }

    pub fn timestamp_fractional() -> Self {
        Self { name: "timestampfractional", fractional: true, timezone: false }
    }

    pub fn timestamp_timezone() -> Self {
        Self { name: "timestamptimezone", fractional: true, timezone: true }
    }

    fn format(&self) -> &'static str {
        match (self.fractional, self.timezone) {
            (_, true) => "%Y-%m-%d %H:%M:%S%.6f%:z",
            (true, false) => "%Y-%m-%d %H:%M:%S%.6f",
            (false, false) => "%Y-%m-%d %H:%M:%S",
        }
    }

    fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::DateTimeTz(dt) => Some(*dt),
            Value::DateTime(dt) => Some(dt.and_utc()),
            Value::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
            Value::String(s) => parse_utc_datetime(s),
            Value::Int(ts) => DateTime::from_timestamp(*ts, 0),
            _ => None,
        }
    }

    fn host_value(&self, dt: DateTime<Utc>) -> Value {
        if self.timezone {
            Value::DateTimeTz(dt)
        } else {
            Value::DateTime(dt.naive_utc())
        }
    }
}

impl SqlType for DateTimeType {
    fn name(&self) -> &str {
        self.name
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null | Value::String(_) => Ok(value.clone()),
            other => Self::parse(other)
                .map(|dt| Value::String(dt.format(self.format()).to_string()))
                .ok_or_else(|| cannot_convert(other, self.name)),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if is_zero_date(s) => Ok(Value::Null),
            other => Self::parse(other)
                .map(|dt| self.host_value(dt))
                .ok_or_else(|| DbError::conversion(self.name, format!("unparseable: {other}"))),
        }
    }

    fn marshal(&self, value: &Value) -> Value {
        Self::parse(value).map_or(Value::Null, |dt| self.host_value(dt))
    }
}

/// Convert a host value into JSON.
pub(crate) fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(v) => Json::Bool(*v),
        Value::Int(v) => Json::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
        Value::Json(v) => v.clone(),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Bytes(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
        other => Json::String(other.to_string()),
    }
}

/// `json`, stored as serialized text.
#[derive(Debug, Clone, Copy)]
pub struct JsonType;

impl SqlType for JsonType {
    fn name(&self) -> &str {
        "json"
    }

    fn to_database(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            other => serde_json::to_string(&value_to_json(other))
                .map(Value::String)
                .map_err(|e| DbError::conversion("json", e.to_string())),
        }
    }

    fn to_host(&self, value: &Value, _dialect: &dyn Dialect) -> DbResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Json(v) => Ok(Value::Json(v.clone())),
            Value::String(s) => serde_json::from_str(s)
                .map(Value::Json)
                .map_err(|e| DbError::conversion("json", e.to_string())),
            Value::Bytes(b) => serde_json::from_slice(b)
                .map(Value::Json)
                .map_err(|e| DbError::conversion("json", e.to_string())),
            other => Ok(Value::Json(value_to_json(other))),
        }
    }

    fn marshal(&self, value: &Value) -> Value {
        value.clone()
    }
}
