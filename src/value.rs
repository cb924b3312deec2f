//! Bound parameter values and ordered column/value records.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, QuarryResult};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Dynamic value type for bindings and hydrated cells.
///
/// Temporal and decimal cells keep their own variants so they are bound
/// with the column's native type. SQLite stores them as text, so the
/// coercions below also accept `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
        }
    }
}

/// Interpolated form. Only used for logging and `Fragment::inline`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
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
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
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

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v.naive_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Coercion from a hydrated cell into a model field type.
///
/// `column` only feeds the error message.
pub trait FromValue: Sized {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value, _column: &str) -> QuarryResult<Self> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        match value {
            Value::Int(n) => Ok(n),
            Value::Bool(b) => Ok(b as i64),
            Value::Float(f) if f.fract() == 0.0 => Ok(f as i64),
            Value::Decimal(d) if d.fract().is_zero() => {
                d.to_i64().ok_or_else(|| QuarryError::decode(column, "i64"))
            }
            Value::Text(s) => s.trim().parse().map_err(|_| QuarryError::decode(column, "i64")),
            _ => Err(QuarryError::decode(column, "i64")),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        let n = i64::from_value(value, column)?;
        i32::try_from(n).map_err(|_| QuarryError::decode(column, "i32"))
    }
}

impl FromValue for i16 {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        let n = i64::from_value(value, column)?;
        i16::try_from(n).map_err(|_| QuarryError::decode(column, "i16"))
    }
}

impl FromValue for u32 {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        let n = i64::from_value(value, column)?;
        u32::try_from(n).map_err(|_| QuarryError::decode(column, "u32"))
    }
}

impl FromValue for f64 {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(n) => Ok(n as f64),
            Value::Decimal(d) => d.to_f64().ok_or_else(|| QuarryError::decode(column, "f64")),
            Value::Text(s) => s.trim().parse().map_err(|_| QuarryError::decode(column, "f64")),
            _ => Err(QuarryError::decode(column, "f64")),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        f64::from_value(value, column).map(|f| f as f32)
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(n) => Ok(Decimal::from(n)),
            Value::Float(f) => Decimal::from_f64(f).ok_or_else(|| QuarryError::decode(column, "Decimal")),
            Value::Text(s) => s.trim().parse().map_err(|_| QuarryError::decode(column, "Decimal")),
            _ => Err(QuarryError::decode(column, "Decimal")),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        // MySQL TINYINT(1) and SQLite store booleans as integers.
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Text(s) => match s.as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(QuarryError::decode(column, "bool")),
            },
            _ => Err(QuarryError::decode(column, "bool")),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Err(QuarryError::decode(column, "String")),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        let s = match value {
            Value::DateTime(dt) => return Ok(dt),
            Value::Date(d) => return Ok(d.and_time(NaiveTime::MIN)),
            Value::Text(s) => s,
            _ => return Err(QuarryError::decode(column, "NaiveDateTime")),
        };
        NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f"))
            .or_else(|_| DateTime::parse_from_rfc3339(&s).map(|dt| dt.naive_utc()))
            .map_err(|_| QuarryError::decode(column, "NaiveDateTime"))
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        let s = match value {
            Value::Date(d) => return Ok(d),
            Value::DateTime(dt) => return Ok(dt.date()),
            Value::Text(s) => s,
            _ => return Err(QuarryError::decode(column, "NaiveDate")),
        };
        let date_part = s.get(..10).unwrap_or(&s);
        NaiveDate::parse_from_str(date_part, DATE_FORMAT)
            .map_err(|_| QuarryError::decode(column, "NaiveDate"))
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        match value {
            Value::Time(t) => Ok(t),
            Value::DateTime(dt) => Ok(dt.time()),
            Value::Text(s) => NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
                .map_err(|_| QuarryError::decode(column, "NaiveTime")),
            _ => Err(QuarryError::decode(column, "NaiveTime")),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        NaiveDateTime::from_value(value, column).map(|dt| dt.and_utc())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value, column: &str) -> QuarryResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other, column).map(Some),
        }
    }
}

/// Insertion-ordered column → value map.
///
/// Inserting an existing column replaces its value in place, so rendered
/// column lists keep the order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    /// Overlay `other` on top of `self`; `other` wins on shared columns.
    pub fn merged(mut self, other: &Record) -> Self {
        for (column, value) in other.iter() {
            self.insert(column, value.clone());
        }
        self
    }

    /// Project onto `columns`, in that order. `None` if any is missing.
    pub fn project(&self, columns: &[&str]) -> Option<Record> {
        columns
            .iter()
            .map(|c| self.get(c).map(|v| (c.to_string(), v.clone())))
            .collect::<Option<Vec<_>>>()
            .map(|entries| Record { entries })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Build a [`Record`] from `column => value` pairs.
///
/// ```
/// let r = quarry::record! { "email" => "a@x.com", "age" => 30 };
/// assert_eq!(r.len(), 2);
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::value::Record::new() };
    ($($column:expr => $value:expr),+ $(,)?) => {
        $crate::value::Record::new()$(.with($column, $value))+
    };
}
