//! Cross-engine value normalization.
//!
//! MySQL and PostgreSQL hand back different native types for the same
//! logical value (a `DATETIME` and a `timestamptz`, a `tinyint(1)` and a
//! `boolean`). Every cell is rendered to a canonical string before
//! comparison so identical logical data produces identical text.
//!
//! Key normalization rules:
//! - NULLs: the literal string `NULL`
//! - Timestamp-like columns: `YYYY-MM-DD HH:MM:SS` in UTC, sub-seconds dropped
//! - Booleans: `1` or `0`
//! - Binary: lowercase hex
//! - Everything else: the value's natural text form

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::SqlValue;
use crate::error::{Result, VerifyError};

/// Literal token for SQL NULL.
pub const NULL_TOKEN: &str = "NULL";

/// Output format for timestamp-like columns.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column names treated as timestamps under [`TimestampRule::Exact`].
const EXACT_TIMESTAMP_COLUMNS: &[&str] = &["created_at", "updated_at", "deleted_at", "date"];

/// Naive layouts accepted for timestamp text, tried in order.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Offset-carrying layouts beyond RFC 3339 (PostgreSQL text output uses `+00`).
const OFFSET_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Decides which column names hold timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampRule {
    /// Only `created_at`, `updated_at`, `deleted_at` and `date`.
    Exact,
    /// Any name containing `_at`, plus `date`.
    Contains,
}

impl TimestampRule {
    /// Default rule for a run: the broader match when foreign keys are checked.
    pub fn for_mode(check_foreign_keys: bool) -> Self {
        if check_foreign_keys {
            TimestampRule::Contains
        } else {
            TimestampRule::Exact
        }
    }

    /// Whether `column` is parsed as a timestamp under this rule.
    pub fn matches(&self, column: &str) -> bool {
        match self {
            TimestampRule::Exact => EXACT_TIMESTAMP_COLUMNS.contains(&column),
            TimestampRule::Contains => column.contains("_at") || column == "date",
        }
    }
}

/// Render one cell into its comparable string form.
///
/// # Errors
///
/// Returns [`VerifyError::Normalize`] when a timestamp-like column holds a
/// value that cannot be read as a point in time.
pub fn normalize(column: &str, value: &SqlValue, rule: TimestampRule) -> Result<String> {
    if value.is_null() {
        return Ok(NULL_TOKEN.to_string());
    }
    if rule.matches(column) {
        return normalize_timestamp(column, value);
    }
    Ok(canonical(value))
}

fn normalize_timestamp(column: &str, value: &SqlValue) -> Result<String> {
    let parsed = match value {
        SqlValue::DateTime(dt) => Some(dt.and_utc()),
        SqlValue::DateTimeOffset(dt) => Some(dt.with_timezone(&Utc)),
        SqlValue::Date(d) => d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()),
        SqlValue::Int(ms) => DateTime::from_timestamp_millis(*ms),
        SqlValue::UInt(ms) => i64::try_from(*ms).ok().and_then(DateTime::from_timestamp_millis),
        SqlValue::Text(s) => {
            let s = s.trim();
            if s == NULL_TOKEN {
                return Ok(NULL_TOKEN.to_string());
            }
            parse_timestamp_text(s)
        }
        _ => None,
    };

    parsed
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .ok_or_else(|| VerifyError::Normalize {
            column: column.to_string(),
            value: canonical(value),
        })
}

/// Parse timestamp text. Text without an offset is read as UTC.
fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(s, layout) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Natural text form of a non-timestamp value.
fn canonical(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => NULL_TOKEN.to_string(),
        SqlValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::UInt(v) => v.to_string(),
        SqlValue::F32(v) => v.to_string(),
        SqlValue::F64(v) => v.to_string(),
        SqlValue::Decimal(v) => v.to_string(),
        SqlValue::Text(v) => v.clone(),
        SqlValue::Bytes(v) => crate::core::value::hex(v),
        SqlValue::Uuid(v) => v.hyphenated().to_string(),
        SqlValue::Date(v) => v.format("%Y-%m-%d").to_string(),
        SqlValue::Time(v) => v.to_string(),
        SqlValue::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        SqlValue::DateTimeOffset(v) => v
            .with_timezone(&Utc)
            .format("%Y-%m-%d %H:%M:%S%.f")
            .to_string(),
        SqlValue::Json(v) => v.to_string(),
    }
}
