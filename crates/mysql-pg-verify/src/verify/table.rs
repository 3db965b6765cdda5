//! Per-table reconciliation: row count, id set, sampled rows, foreign keys.
//!
//! Each step short-circuits: the first mismatch or table-scoped error ends
//! the table with a failing [`MismatchReport`]. Run-fatal errors
//! (connectivity, cancellation) are returned to the caller instead.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::core::{Engine, ForeignKeyConstraint, QueryExecutor, Row, SqlValue};
use crate::drivers::DialectImpl;
use crate::error::{Result, VerifyError};

use super::compare::compare_rows;
use super::events::EventSink;
use super::normalize::{normalize, TimestampRule};
use super::query::{
    count_query, distinct_values_query, id_list_query, sample_query, ID_COLUMN,
};
use super::types::{MismatchReport, VerifyEvent};

/// Maximum number of differing foreign-key values quoted in a reason.
const MAX_QUOTED_VALUES: usize = 5;

/// One side of a reconciliation: a session plus the namespace its tables
/// are qualified with.
#[derive(Clone, Copy)]
pub struct Endpoint<'a> {
    pub executor: &'a dyn QueryExecutor,
    pub namespace: Option<&'a str>,
}

impl<'a> Endpoint<'a> {
    pub fn new(executor: &'a dyn QueryExecutor, namespace: Option<&'a str>) -> Self {
        Self {
            executor,
            namespace,
        }
    }

    fn engine(&self) -> Engine {
        self.executor.engine()
    }

    fn dialect(&self) -> DialectImpl {
        DialectImpl::for_engine(self.engine())
    }

    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        self.executor.execute(sql, params).await
    }

    async fn count(&self, table: &str) -> Result<i64> {
        let sql = count_query(&self.dialect(), self.namespace, table)?;
        let rows = self.query(&sql, &[]).await?;
        let value = rows.first().and_then(|r| r.first()).ok_or_else(|| {
            VerifyError::query(format!("counting {}", table), "no rows returned")
        })?;
        as_count(value)
            .ok_or_else(|| VerifyError::query(format!("counting {}", table), format!("{:?}", value)))
    }

    async fn ids(&self, table: &str) -> Result<Vec<SqlValue>> {
        let sql = id_list_query(&self.dialect(), self.namespace, table)?;
        let rows = self.query(&sql, &[]).await?;
        Ok(rows
            .into_iter()
            .map(|r| r.first().cloned().unwrap_or(SqlValue::Null))
            .collect())
    }

    async fn sample(&self, table: &str, ids: &[SqlValue]) -> Result<Vec<Row>> {
        let sql = sample_query(&self.dialect(), self.namespace, table, ids.len())?;
        self.query(&sql, ids).await
    }

    async fn distinct_values(&self, table: &str, column: &str) -> Result<Vec<SqlValue>> {
        let sql = distinct_values_query(&self.dialect(), self.namespace, table, column)?;
        let rows = self.query(&sql, &[]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.first().cloned())
            .collect())
    }
}

/// Foreign-key constraints of both sides, loaded once per run.
#[derive(Clone, Copy)]
pub struct ForeignKeySets<'a> {
    pub source: &'a [ForeignKeyConstraint],
    pub target: &'a [ForeignKeyConstraint],
}

/// Runs the check sequence for single tables.
pub struct TableReconciler<'a> {
    source: Endpoint<'a>,
    target: Endpoint<'a>,
    sample_size: usize,
    rule: TimestampRule,
    foreign_keys: Option<ForeignKeySets<'a>>,
    events: EventSink,
}

/// Result of one step: `None` to continue, `Some(reason)` to stop.
type Step = Result<Option<String>>;

impl<'a> TableReconciler<'a> {
    pub fn new(source: Endpoint<'a>, target: Endpoint<'a>) -> Self {
        Self {
            source,
            target,
            sample_size: 50,
            rule: TimestampRule::Exact,
            foreign_keys: None,
            events: EventSink::disabled(),
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_timestamp_rule(mut self, rule: TimestampRule) -> Self {
        self.rule = rule;
        self
    }

    /// Enable the foreign-key step.
    pub fn with_foreign_keys(mut self, sets: ForeignKeySets<'a>) -> Self {
        self.foreign_keys = Some(sets);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Reconcile `table` and produce its report.
    ///
    /// # Errors
    ///
    /// Only run-fatal errors are returned; everything scoped to the table
    /// is folded into a failing report.
    pub async fn reconcile(&self, table: &str) -> Result<MismatchReport> {
        let start = Instant::now();
        self.events
            .emit(VerifyEvent::TableStarted {
                table: table.to_string(),
            })
            .await;

        let report = match self.run_steps(table).await {
            Ok(None) => MismatchReport::matched(table),
            Ok(Some(reason)) => MismatchReport::mismatch(table, reason),
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                warn!("{}: check failed: {}", table, e);
                MismatchReport::mismatch(table, e.to_string())
            }
        }
        .with_duration(start.elapsed());

        if report.is_match {
            info!("{}: table matches", table);
        } else {
            info!("{}: table does not match - {}", table, report.reason);
        }
        self.events
            .emit(VerifyEvent::TableFinished {
                report: report.clone(),
            })
            .await;
        Ok(report)
    }

    async fn run_steps(&self, table: &str) -> Step {
        if let Some(reason) = self.check_counts(table).await? {
            return Ok(Some(reason));
        }

        let (source_ids, target_ids) = match self.fetch_ids(table).await? {
            Some((source, target)) => {
                if let Some(reason) = self.check_ids(table, &source, &target).await? {
                    return Ok(Some(reason));
                }
                (source, target)
            }
            None => (Vec::new(), Vec::new()),
        };
        if let Some(reason) = self.check_sample(table, &source_ids, &target_ids).await? {
            return Ok(Some(reason));
        }

        if let Some(sets) = self.foreign_keys {
            return self.check_foreign_keys(table, sets).await;
        }
        Ok(None)
    }

    async fn check_counts(&self, table: &str) -> Step {
        let (source, target) =
            tokio::try_join!(self.source.count(table), self.target.count(table))?;
        debug!("{}: row counts {} / {}", table, source, target);
        self.events
            .emit(VerifyEvent::RowCounts {
                table: table.to_string(),
                source,
                target,
            })
            .await;

        if source != target {
            return Ok(Some(format!(
                "row count differs: {}={}, {}={}",
                self.source.engine(),
                source,
                self.target.engine(),
                target
            )));
        }
        Ok(None)
    }

    /// Ordered ids of both sides, or `None` when the id query was rejected
    /// by either server (no `id` column, for instance). Timeouts and other
    /// failures are returned.
    async fn fetch_ids(&self, table: &str) -> Result<Option<(Vec<SqlValue>, Vec<SqlValue>)>> {
        match tokio::try_join!(self.source.ids(table), self.target.ids(table)) {
            Ok(ids) => Ok(Some(ids)),
            Err(e @ VerifyError::Query { .. }) => {
                debug!("{}: id query failed: {}", table, e);
                self.events
                    .emit(VerifyEvent::IdsSkipped {
                        table: table.to_string(),
                        reason: e.to_string(),
                    })
                    .await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn check_ids(&self, table: &str, source: &[SqlValue], target: &[SqlValue]) -> Step {
        if source.is_empty() || target.is_empty() {
            self.events
                .emit(VerifyEvent::IdsSkipped {
                    table: table.to_string(),
                    reason: "no ids".to_string(),
                })
                .await;
            return Ok(None);
        }

        self.events
            .emit(VerifyEvent::IdsCompared {
                table: table.to_string(),
                source: source.len(),
                target: target.len(),
            })
            .await;

        let source = self.render_all(ID_COLUMN, source)?;
        let target = self.render_all(ID_COLUMN, target)?;
        if source != target {
            return Ok(Some("ids differ".to_string()));
        }
        Ok(None)
    }

    async fn check_sample(&self, table: &str, source_ids: &[SqlValue], target_ids: &[SqlValue]) -> Step {
        let take = self.sample_size.min(source_ids.len());
        if take == 0 {
            self.events
                .emit(VerifyEvent::SampleSkipped {
                    table: table.to_string(),
                })
                .await;
            return Ok(None);
        }

        // Each side binds its own decoded ids; they render identically
        // after the id check.
        let source_sample = &source_ids[..take];
        let target_sample = if target_ids.len() >= take {
            &target_ids[..take]
        } else {
            source_sample
        };

        let (source_rows, target_rows) = tokio::try_join!(
            self.source.sample(table, source_sample),
            self.target.sample(table, target_sample)
        )?;

        self.events
            .emit(VerifyEvent::SampleFetched {
                table: table.to_string(),
                source: source_rows.len(),
                target: target_rows.len(),
            })
            .await;

        if source_rows.len() != target_rows.len() {
            return Ok(Some(format!(
                "sample row count differs: {}={}, {}={}",
                self.source.engine(),
                source_rows.len(),
                self.target.engine(),
                target_rows.len()
            )));
        }

        for (a, b) in source_rows.iter().zip(&target_rows) {
            let outcome = compare_rows(a, b, self.rule)?;
            if !outcome.is_match {
                self.emit_raw_row(table, self.source.engine(), a).await;
                self.emit_raw_row(table, self.target.engine(), b).await;
                return Ok(Some(outcome.reason));
            }
        }
        Ok(None)
    }

    async fn emit_raw_row(&self, table: &str, engine: Engine, row: &Row) {
        let id = row
            .get(ID_COLUMN)
            .and_then(|v| normalize(ID_COLUMN, v, self.rule).ok())
            .unwrap_or_default();
        self.events
            .emit(VerifyEvent::RawRow {
                table: table.to_string(),
                engine,
                id,
                row: row.to_json(),
            })
            .await;
    }

    async fn check_foreign_keys(&self, table: &str, sets: ForeignKeySets<'_>) -> Step {
        let source: Vec<&ForeignKeyConstraint> =
            sets.source.iter().filter(|fk| fk.is_on_table(table)).collect();
        let target: Vec<&ForeignKeyConstraint> =
            sets.target.iter().filter(|fk| fk.is_on_table(table)).collect();

        if source.len() != target.len() {
            return Ok(Some(format!(
                "foreign key count differs: {}={}, {}={}",
                self.source.engine(),
                source.len(),
                self.target.engine(),
                target.len()
            )));
        }

        let source_keys = key_counts(&source);
        let target_keys = key_counts(&target);
        for (key, (count, fk)) in &source_keys {
            if target_keys.get(key).map_or(0, |(n, _)| *n) < *count {
                return Ok(Some(format!(
                    "foreign key {} has no counterpart in {}",
                    fk,
                    self.target.engine()
                )));
            }
        }
        for (key, (count, fk)) in &target_keys {
            if source_keys.get(key).map_or(0, |(n, _)| *n) < *count {
                return Ok(Some(format!(
                    "foreign key {} has no counterpart in {}",
                    fk,
                    self.source.engine()
                )));
            }
        }

        for (key, (_, fk)) in &source_keys {
            let Some((_, counterpart)) = target_keys.get(key) else {
                continue;
            };
            if let Some(reason) = self.check_reference_values(table, fk, counterpart).await? {
                return Ok(Some(reason));
            }
        }

        self.events
            .emit(VerifyEvent::ForeignKeysCompared {
                table: table.to_string(),
                constraints: source.len(),
            })
            .await;
        Ok(None)
    }

    /// Distinct non-null values of the referencing column must be equal sets.
    async fn check_reference_values(
        &self,
        table: &str,
        fk: &ForeignKeyConstraint,
        counterpart: &ForeignKeyConstraint,
    ) -> Step {
        let (source, target) = tokio::try_join!(
            self.source.distinct_values(table, &fk.column),
            self.target.distinct_values(table, &counterpart.column)
        )?;
        let source: BTreeSet<String> = self.render_all(&fk.column, &source)?.into_iter().collect();
        let target: BTreeSet<String> =
            self.render_all(&counterpart.column, &target)?.into_iter().collect();

        if source == target {
            return Ok(None);
        }

        let mut details = Vec::new();
        let missing: Vec<&str> = source.difference(&target).map(String::as_str).collect();
        if !missing.is_empty() {
            details.push(format!(
                "missing in {}: {}",
                self.target.engine(),
                quote_values(&missing)
            ));
        }
        let extra: Vec<&str> = target.difference(&source).map(String::as_str).collect();
        if !extra.is_empty() {
            details.push(format!(
                "missing in {}: {}",
                self.source.engine(),
                quote_values(&extra)
            ));
        }
        Ok(Some(format!(
            "foreign key {} values differ ({}={} distinct, {}={} distinct); {}",
            fk,
            self.source.engine(),
            source.len(),
            self.target.engine(),
            target.len(),
            details.join("; ")
        )))
    }

    fn render_all(&self, column: &str, values: &[SqlValue]) -> Result<Vec<String>> {
        values
            .iter()
            .map(|v| normalize(column, v, self.rule))
            .collect()
    }
}

type ForeignKeyKey = (String, String, String, String);

/// Constraints grouped by case-insensitive key, with their multiplicity.
fn key_counts<'f>(
    constraints: &[&'f ForeignKeyConstraint],
) -> BTreeMap<ForeignKeyKey, (usize, &'f ForeignKeyConstraint)> {
    let mut counts = BTreeMap::new();
    for fk in constraints {
        counts.entry(fk.key()).or_insert((0, *fk)).0 += 1;
    }
    counts
}

fn as_count(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::Int(v) => Some(*v),
        SqlValue::UInt(v) => i64::try_from(*v).ok(),
        SqlValue::Decimal(v) => v.to_string().parse().ok(),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn quote_values(values: &[&str]) -> String {
    let mut quoted: Vec<String> = values
        .iter()
        .take(MAX_QUOTED_VALUES)
        .map(|v| format!("\"{}\"", v))
        .collect();
    if values.len() > MAX_QUOTED_VALUES {
        quoted.push(format!("... ({} more)", values.len() - MAX_QUOTED_VALUES));
    }
    quoted.join(", ")
}
