//! Report, outcome and event types for reconciliation runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::Engine;

/// Table name used for the run-level report when the table lists differ
/// under [`TableListPolicy::Abort`].
pub const TABLE_LIST_SCOPE: &str = "<table list>";

/// Result of reconciling one table. Terminal once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchReport {
    /// Table name.
    pub table: String,
    /// Whether every check passed.
    pub is_match: bool,
    /// Why the table did not match. Empty when `is_match` is true.
    pub reason: String,
    /// Wall-clock time spent on this table.
    pub duration_ms: u64,
}

impl MismatchReport {
    /// A passing report.
    pub fn matched(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            is_match: true,
            reason: String::new(),
            duration_ms: 0,
        }
    }

    /// A failing report. An empty reason is replaced so a failure always
    /// carries an explanation.
    pub fn mismatch(table: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut reason = reason.into();
        if reason.is_empty() {
            reason = "unspecified mismatch".to_string();
        }
        Self {
            table: table.into(),
            is_match: false,
            reason,
            duration_ms: 0,
        }
    }

    /// Record the time spent on the table.
    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_millis() as u64;
        self
    }
}

/// Result of comparing two rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonOutcome {
    pub is_match: bool,
    pub reason: String,
}

impl ComparisonOutcome {
    pub fn matched() -> Self {
        Self {
            is_match: true,
            reason: String::new(),
        }
    }

    pub fn mismatch(reason: impl Into<String>) -> Self {
        Self {
            is_match: false,
            reason: reason.into(),
        }
    }
}

/// What to do when source and target table lists differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableListPolicy {
    /// Report missing and extra tables, then reconcile the tables both
    /// sides have.
    #[default]
    CommonSubset,
    /// Stop before any table check with a single run-level mismatch.
    Abort,
}

/// Difference between the source and target table lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListDiff {
    /// Tables present in the source but not in the target (sorted).
    pub missing_in_target: Vec<String>,
    /// Tables present in the target but not in the source (sorted).
    pub extra_in_target: Vec<String>,
}

impl TableListDiff {
    /// Compare two table lists as sets.
    pub fn between(source: &[String], target: &[String]) -> Self {
        let mut missing_in_target: Vec<String> = source
            .iter()
            .filter(|t| !target.contains(t))
            .cloned()
            .collect();
        let mut extra_in_target: Vec<String> = target
            .iter()
            .filter(|t| !source.contains(t))
            .cloned()
            .collect();
        missing_in_target.sort();
        missing_in_target.dedup();
        extra_in_target.sort();
        extra_in_target.dedup();
        Self {
            missing_in_target,
            extra_in_target,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing_in_target.is_empty() && self.extra_in_target.is_empty()
    }
}

impl fmt::Display for TableListDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "table lists match");
        }
        write!(f, "table list differs")?;
        if !self.missing_in_target.is_empty() {
            write!(
                f,
                "; missing in target: {}",
                self.missing_in_target.join(", ")
            )?;
        }
        if !self.extra_in_target.is_empty() {
            write!(f, "; extra in target: {}", self.extra_in_target.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome of a whole reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Whether foreign keys were compared.
    pub check_foreign_keys: bool,
    /// Source and target table-list difference.
    pub table_list: TableListDiff,
    /// True when the run stopped at the table-list stage.
    pub aborted: bool,
    /// One report per reconciled table, in source enumeration order.
    pub reports: Vec<MismatchReport>,
    pub tables_matched: usize,
    pub tables_mismatched: usize,
}

impl VerifyResult {
    /// Build a result from the collected reports.
    pub fn new(
        started_at: DateTime<Utc>,
        check_foreign_keys: bool,
        table_list: TableListDiff,
        aborted: bool,
        reports: Vec<MismatchReport>,
    ) -> Self {
        let completed_at = Utc::now();
        let tables_matched = reports.iter().filter(|r| r.is_match).count();
        let tables_mismatched = reports.len() - tables_matched;
        Self {
            started_at,
            completed_at,
            duration_ms: (completed_at - started_at).num_milliseconds().max(0) as u64,
            check_foreign_keys,
            table_list,
            aborted,
            reports,
            tables_matched,
            tables_mismatched,
        }
    }

    /// No mismatching table and identical table lists.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.table_list.is_empty() && self.tables_mismatched == 0
    }

    /// Reports that did not match.
    pub fn failures(&self) -> impl Iterator<Item = &MismatchReport> {
        self.reports.iter().filter(|r| !r.is_match)
    }
}

/// Structured progress event emitted during a run.
///
/// `Display` renders the human-readable log line (without timestamp).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum VerifyEvent {
    RunStarted {
        check_foreign_keys: bool,
    },
    ForeignKeysLoaded {
        source: usize,
        target: usize,
    },
    TableListCompared {
        source: usize,
        target: usize,
        diff: TableListDiff,
    },
    TableStarted {
        table: String,
    },
    RowCounts {
        table: String,
        source: i64,
        target: i64,
    },
    IdsCompared {
        table: String,
        source: usize,
        target: usize,
    },
    IdsSkipped {
        table: String,
        reason: String,
    },
    SampleFetched {
        table: String,
        source: usize,
        target: usize,
    },
    SampleSkipped {
        table: String,
    },
    RawRow {
        table: String,
        engine: Engine,
        id: String,
        /// Row rendered as a JSON object in column order.
        row: String,
    },
    ForeignKeysCompared {
        table: String,
        constraints: usize,
    },
    TableFinished {
        report: MismatchReport,
    },
    RunFinished {
        tables: usize,
        mismatched: usize,
    },
}

impl fmt::Display for VerifyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyEvent::RunStarted { check_foreign_keys } => write!(
                f,
                "Verification started (foreign keys: {})",
                if *check_foreign_keys { "on" } else { "off" }
            ),
            VerifyEvent::ForeignKeysLoaded { source, target } => write!(
                f,
                "Foreign keys loaded - MySQL: {}, PostgreSQL: {}",
                source, target
            ),
            VerifyEvent::TableListCompared { source, target, diff } => {
                if diff.is_empty() {
                    write!(f, "Table lists match ({} tables)", source)
                } else {
                    write!(f, "Table lists differ (MySQL: {}, PostgreSQL: {}): {}", source, target, diff)
                }
            }
            VerifyEvent::TableStarted { table } => write!(f, "{}: check started", table),
            VerifyEvent::RowCounts { table, source, target } => write!(
                f,
                "{}: MySQL row count - {}, PostgreSQL row count - {}",
                table, source, target
            ),
            VerifyEvent::IdsCompared { table, source, target } => write!(
                f,
                "{}: ids compared - MySQL: {}, PostgreSQL: {}",
                table, source, target
            ),
            VerifyEvent::IdsSkipped { table, reason } => {
                write!(f, "{}: id check skipped ({})", table, reason)
            }
            VerifyEvent::SampleFetched { table, source, target } => write!(
                f,
                "{}: sample rows - MySQL: {}, PostgreSQL: {}",
                table, source, target
            ),
            VerifyEvent::SampleSkipped { table } => {
                write!(f, "{}: no sample (table empty or has no id)", table)
            }
            VerifyEvent::RawRow { table, engine, id, row } => {
                write!(f, "{}: row id={} - {}: {}", table, id, engine, row)
            }
            VerifyEvent::ForeignKeysCompared { table, constraints } => write!(
                f,
                "{}: {} foreign key(s) match",
                table, constraints
            ),
            VerifyEvent::TableFinished { report } => {
                if report.is_match {
                    write!(f, "{}: table matches ({}ms)", report.table, report.duration_ms)
                } else {
                    write!(
                        f,
                        "{}: table does not match - reason: {}",
                        report.table, report.reason
                    )
                }
            }
            VerifyEvent::RunFinished { tables, mismatched } => write!(
                f,
                "All checks finished: {} table(s), {} mismatched",
                tables, mismatched
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_reason_invariant() {
        let ok = MismatchReport::matched("users");
        assert!(ok.is_match);
        assert!(ok.reason.is_empty());

        let bad = MismatchReport::mismatch("users", "");
        assert!(!bad.is_match);
        assert!(!bad.reason.is_empty());
    }

    #[test]
    fn test_table_list_diff() {
        let source = vec!["orders".to_string(), "users".to_string()];
        let target = vec!["orders".to_string(), "audit".to_string()];
        let diff = TableListDiff::between(&source, &target);
        assert_eq!(diff.missing_in_target, vec!["users"]);
        assert_eq!(diff.extra_in_target, vec!["audit"]);
        assert_eq!(
            diff.to_string(),
            "table list differs; missing in target: users; extra in target: audit"
        );
    }

    #[test]
    fn test_table_list_diff_ignores_order() {
        let source = vec!["b".to_string(), "a".to_string()];
        let target = vec!["a".to_string(), "b".to_string()];
        assert!(TableListDiff::between(&source, &target).is_empty());
    }

    #[test]
    fn test_result_counts_and_cleanliness() {
        let reports = vec![
            MismatchReport::matched("a"),
            MismatchReport::mismatch("b", "row count differs"),
        ];
        let result = VerifyResult::new(Utc::now(), false, TableListDiff::default(), false, reports);
        assert_eq!(result.tables_matched, 1);
        assert_eq!(result.tables_mismatched, 1);
        assert!(!result.is_clean());
        assert_eq!(result.failures().count(), 1);

        let clean = VerifyResult::new(
            Utc::now(),
            false,
            TableListDiff::default(),
            false,
            vec![MismatchReport::matched("a")],
        );
        assert!(clean.is_clean());
    }

    #[test]
    fn test_event_lines() {
        let event = VerifyEvent::RowCounts {
            table: "orders".into(),
            source: 5,
            target: 6,
        };
        assert_eq!(
            event.to_string(),
            "orders: MySQL row count - 5, PostgreSQL row count - 6"
        );

        let event = VerifyEvent::TableFinished {
            report: MismatchReport::mismatch("orders", "ids differ"),
        };
        assert_eq!(
            event.to_string(),
            "orders: table does not match - reason: ids differ"
        );
    }
}
