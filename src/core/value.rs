//! Purpose: Typed cell values and the type tags used to pick an encoding rule.
//! Exports: `CellValue`, `ValueType`, `unix_millis`, `instant_from_unix_millis`.
//! Role: The only value currency between record producers and table backends.
//! Invariants: `Null` carries no runtime type; its effective type falls back to `Any`.
//! Invariants: Instants are UTC-normalized and encode to epoch milliseconds.
use std::fmt;

use time::OffsetDateTime;

/// Type tag attached to every write, either declared by the caller or taken
/// from the value itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Text,
    Instant,
    Binary,
    /// Generic fallback used for an undeclared null.
    Any,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "text",
            ValueType::Instant => "instant",
            ValueType::Binary => "binary",
            ValueType::Any => "any",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Instant(OffsetDateTime),
    Binary(Vec<u8>),
}

impl CellValue {
    /// Runtime type of the value; `None` for null.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            CellValue::Null => None,
            CellValue::Bool(_) => Some(ValueType::Bool),
            CellValue::Int(_) => Some(ValueType::Int),
            CellValue::Float(_) => Some(ValueType::Float),
            CellValue::Text(_) => Some(ValueType::Text),
            CellValue::Instant(_) => Some(ValueType::Instant),
            CellValue::Binary(_) => Some(ValueType::Binary),
        }
    }

    /// Declared type if given, else the runtime type, else `Any`.
    pub fn effective_type(&self, declared: Option<ValueType>) -> ValueType {
        declared
            .or_else(|| self.value_type())
            .unwrap_or(ValueType::Any)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

pub fn unix_millis(instant: &OffsetDateTime) -> i64 {
    instant.unix_timestamp_nanos().div_euclid(1_000_000) as i64
}

pub fn instant_from_unix_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(i64::from(value))
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Int(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<OffsetDateTime> for CellValue {
    fn from(value: OffsetDateTime) -> Self {
        CellValue::Instant(value)
    }
}

impl From<Vec<u8>> for CellValue {
    fn from(value: Vec<u8>) -> Self {
        CellValue::Binary(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Null)
    }
}
