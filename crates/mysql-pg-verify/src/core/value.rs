//! SQL value and row types shared by both engines.
//!
//! Rows are decoded eagerly from driver rows into owned values so the
//! reconciliation engine can work without knowing which engine produced
//! them. The same [`SqlValue`] type is used for bound query parameters.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A single loosely-typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean value (PostgreSQL `boolean`, MySQL `tinyint(1)`).
    Bool(bool),

    /// Signed integer of any width.
    Int(i64),

    /// Unsigned integer (MySQL `UNSIGNED` columns).
    UInt(u64),

    /// 32-bit floating point (real/float4).
    F32(f32),

    /// 64-bit floating point (double precision/float8).
    F64(f64),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Text/string data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// JSON document.
    Json(serde_json::Value),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short type tag used in log output.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::UInt(_) => "uint",
            SqlValue::F32(_) => "float4",
            SqlValue::F64(_) => "float8",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Date(_) => "date",
            SqlValue::Time(_) => "time",
            SqlValue::DateTime(_) => "timestamp",
            SqlValue::DateTimeOffset(_) => "timestamptz",
            SqlValue::Json(_) => "json",
        }
    }

    /// Render as a JSON value for raw-row log lines.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(v) => Value::Bool(*v),
            SqlValue::Int(v) => Value::from(*v),
            SqlValue::UInt(v) => Value::from(*v),
            SqlValue::F32(v) => Value::from(*v as f64),
            SqlValue::F64(v) => Value::from(*v),
            SqlValue::Decimal(v) => Value::String(v.to_string()),
            SqlValue::Text(v) => Value::String(v.clone()),
            SqlValue::Bytes(v) => Value::String(hex(v)),
            SqlValue::Uuid(v) => Value::String(v.to_string()),
            SqlValue::Date(v) => Value::String(v.to_string()),
            SqlValue::Time(v) => Value::String(v.to_string()),
            SqlValue::DateTime(v) => Value::String(v.to_string()),
            SqlValue::DateTimeOffset(v) => Value::String(v.to_rfc3339()),
            SqlValue::Json(v) => v.clone(),
        }
    }
}

/// Lowercase hex encoding for binary values.
pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::UInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        SqlValue::DateTimeOffset(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row: column names in select order paired with their values.
///
/// Column lookup is by exact name. Duplicate names (e.g. from joins) keep
/// the first occurrence for lookups but are all preserved in iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, SqlValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    /// Create a row with room for `n` columns.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            cells: Vec::with_capacity(n),
        }
    }

    /// Append a column.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Builder-style append, mostly for tests and fixtures.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    /// Look up a value by column name.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    /// Value of the first column, used for single-column result sets.
    pub fn first(&self) -> Option<&SqlValue> {
        self.cells.first().map(|(_, v)| v)
    }

    /// Column names in select order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over `(column, value)` pairs in select order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.cells.iter().map(|(name, v)| (name.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Render the row as a JSON object, preserving column order.
    pub fn to_json(&self) -> String {
        let body = self
            .cells
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}:{}",
                    serde_json::Value::String(name.clone()),
                    value.to_json()
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("{{{}}}", body)
    }
}
