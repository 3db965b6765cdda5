//! Row comparison on normalized values.

use std::collections::BTreeSet;

use crate::core::Row;
use crate::error::Result;

use super::normalize::{normalize, TimestampRule};
use super::types::ComparisonOutcome;

/// Compare two rows selected by the same id.
///
/// Column sets must be identical; shared columns are compared in sorted
/// order as normalized strings. Row `a` is the source side (`A=`), row `b`
/// the target side (`B=`).
///
/// # Errors
///
/// Fails when a timestamp-like value cannot be normalized.
pub fn compare_rows(a: &Row, b: &Row, rule: TimestampRule) -> Result<ComparisonOutcome> {
    let cols_a: BTreeSet<&str> = a.columns().collect();
    let cols_b: BTreeSet<&str> = b.columns().collect();

    if cols_a != cols_b {
        return Ok(ComparisonOutcome::mismatch(format!(
            "column names differ: A=[{}], B=[{}]",
            cols_a.into_iter().collect::<Vec<_>>().join(", "),
            cols_b.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    let mut differences = Vec::new();
    for column in cols_a {
        // Present on both sides: the column sets are equal.
        let (Some(va), Some(vb)) = (a.get(column), b.get(column)) else {
            continue;
        };
        let na = normalize(column, va, rule)?;
        let nb = normalize(column, vb, rule)?;
        if na != nb {
            differences.push(format!("column '{}': A=\"{}\", B=\"{}\"", column, na, nb));
        }
    }

    if differences.is_empty() {
        Ok(ComparisonOutcome::matched())
    } else {
        Ok(ComparisonOutcome::mismatch(differences.join("; ")))
    }
}
