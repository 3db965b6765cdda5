//! Catalog-level reconciliation between a MySQL source and a PostgreSQL
//! target.
//!
//! The run is sequential:
//!
//! 1. **Foreign keys** (optional): extracted once from both catalogs
//! 2. **Table lists**: compared as sets; differences either abort the run
//!    or restrict it to the common tables, per [`TableListPolicy`]
//! 3. **Tables**: each table goes through [`TableReconciler`] in source
//!    order, with a [`PacingStrategy`] pause between tables
//!
//! Table-scoped failures become [`MismatchReport`]s. Connectivity, catalog,
//! deadline and cancellation errors end the run.

pub mod compare;
pub mod events;
pub mod foreign_keys;
pub mod normalize;
pub mod pacing;
pub mod query;
pub mod table;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use compare::compare_rows;
pub use events::EventSink;
pub use foreign_keys::list_foreign_keys;
pub use normalize::{normalize, TimestampRule, NULL_TOKEN};
pub use pacing::{FixedDelay, NoDelay, PacingStrategy};
pub use table::{Endpoint, ForeignKeySets, TableReconciler};
pub use types::{
    ComparisonOutcome, MismatchReport, TableListDiff, TableListPolicy, VerifyEvent, VerifyResult,
    TABLE_LIST_SCOPE,
};

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, VerifyConfig};
use crate::core::{ForeignKeyConstraint, QueryExecutor, SqlValue};
use crate::drivers::{DialectImpl, GuardedExecutor, MysqlExecutor, PostgresExecutor};
use crate::error::{Result, VerifyError};

use foreign_keys::into_catalog;
use query::table_list_query;

/// Table names of both sides and their difference.
#[derive(Debug, Clone, Serialize)]
pub struct TableLists {
    /// Source tables in catalog order.
    pub source: Vec<String>,
    /// Target tables in catalog order.
    pub target: Vec<String>,
    pub diff: TableListDiff,
}

impl TableLists {
    /// Source tables that also exist in the target, in source order.
    pub fn common(&self) -> Vec<String> {
        self.source
            .iter()
            .filter(|t| self.target.contains(t))
            .cloned()
            .collect()
    }
}

/// Engine reconciling every table of a source database against a target
/// schema.
pub struct VerifyEngine {
    source: Arc<dyn QueryExecutor>,
    target: Arc<dyn QueryExecutor>,
    source_database: String,
    target_schema: String,
    config: VerifyConfig,
    pacing: Box<dyn PacingStrategy>,
    events: EventSink,
    cancel: CancellationToken,
}

impl VerifyEngine {
    /// Create an engine over two open sessions.
    ///
    /// `source_database` scopes the MySQL catalog queries; `target_schema`
    /// scopes and qualifies every PostgreSQL query.
    pub fn new(
        source: Arc<dyn QueryExecutor>,
        target: Arc<dyn QueryExecutor>,
        source_database: impl Into<String>,
        target_schema: impl Into<String>,
        config: VerifyConfig,
    ) -> Self {
        let pacing = Box::new(FixedDelay(config.pacing()));
        Self {
            source,
            target,
            source_database: source_database.into(),
            target_schema: target_schema.into(),
            config,
            pacing,
            events: EventSink::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    /// Open both sessions described by `config`, each wrapped with the
    /// configured query timeout and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Connectivity`] if either session cannot be
    /// opened. A source session opened before a target failure is closed.
    pub async fn connect(config: Config) -> Result<Self> {
        let timeout = config.verify.query_timeout();
        let retry = config.verify.retry.clone();

        let source = MysqlExecutor::connect(&config.source).await?;
        let target = match PostgresExecutor::connect(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::new(
            Arc::new(GuardedExecutor::new(source, timeout, retry.clone())),
            Arc::new(GuardedExecutor::new(target, timeout, retry)),
            config.source.database,
            config.target.schema,
            config.verify,
        ))
    }

    /// Release both sessions.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
        debug!("Closed source and target sessions");
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: mpsc::Sender<VerifyEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    /// Replace the pause between tables.
    pub fn with_pacing(mut self, pacing: impl PacingStrategy + 'static) -> Self {
        self.pacing = Box::new(pacing);
        self
    }

    /// Stop between tables once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Reconcile every table, bounded by the configured run deadline.
    ///
    /// # Errors
    ///
    /// Returns run-fatal errors only: connectivity and catalog failures,
    /// [`VerifyError::DeadlineExceeded`] and [`VerifyError::Cancelled`].
    pub async fn reconcile_all(&self) -> Result<VerifyResult> {
        match self.config.run_deadline() {
            Some(deadline) => tokio::time::timeout(deadline, self.run())
                .await
                .map_err(|_| VerifyError::DeadlineExceeded)?,
            None => self.run().await,
        }
    }

    /// Read and compare the two table lists.
    pub async fn table_lists(&self) -> Result<TableLists> {
        let (source, target) = tokio::try_join!(
            list_tables(self.source.as_ref(), &self.source_database),
            list_tables(self.target.as_ref(), &self.target_schema)
        )?;
        let diff = TableListDiff::between(&source, &target);
        Ok(TableLists {
            source,
            target,
            diff,
        })
    }

    async fn run(&self) -> Result<VerifyResult> {
        let started_at = Utc::now();
        let check_fk = self.config.check_foreign_keys;
        self.events
            .emit(VerifyEvent::RunStarted {
                check_foreign_keys: check_fk,
            })
            .await;
        info!(
            "Starting verification: {} '{}' -> {} '{}' (foreign keys: {})",
            self.source.engine(),
            self.source_database,
            self.target.engine(),
            self.target_schema,
            check_fk
        );

        let foreign_keys = if check_fk {
            Some(self.load_foreign_keys().await?)
        } else {
            None
        };

        let lists = self.table_lists().await?;
        self.events
            .emit(VerifyEvent::TableListCompared {
                source: lists.source.len(),
                target: lists.target.len(),
                diff: lists.diff.clone(),
            })
            .await;

        if !lists.diff.is_empty() {
            warn!("{}", lists.diff);
            if self.config.table_list_policy == TableListPolicy::Abort {
                let report = MismatchReport::mismatch(TABLE_LIST_SCOPE, lists.diff.to_string());
                self.events
                    .emit(VerifyEvent::TableFinished {
                        report: report.clone(),
                    })
                    .await;
                return Ok(self
                    .finish(started_at, lists.diff, true, vec![report])
                    .await);
            }
        }

        let tables = lists.common();
        let mut reconciler = TableReconciler::new(
            Endpoint::new(self.source.as_ref(), None),
            Endpoint::new(self.target.as_ref(), Some(self.target_schema.as_str())),
        )
        .with_sample_size(self.config.sample_size)
        .with_timestamp_rule(self.config.timestamp_rule())
        .with_events(self.events.clone());
        if let Some((source, target)) = &foreign_keys {
            reconciler = reconciler.with_foreign_keys(ForeignKeySets {
                source: source.as_slice(),
                target: target.as_slice(),
            });
        }

        let mut reports = Vec::with_capacity(tables.len());
        for (idx, table) in tables.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(VerifyError::Cancelled);
            }
            reports.push(reconciler.reconcile(table).await?);

            if idx + 1 < tables.len() {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Err(VerifyError::Cancelled),
                    _ = self.pacing.pause() => {}
                }
            }
        }

        Ok(self.finish(started_at, lists.diff, false, reports).await)
    }

    async fn load_foreign_keys(
        &self,
    ) -> Result<(Vec<ForeignKeyConstraint>, Vec<ForeignKeyConstraint>)> {
        let probe = self.config.schema_probe_table.as_deref();
        let (source, target) = tokio::try_join!(
            list_foreign_keys(self.source.as_ref(), &self.source_database, probe),
            list_foreign_keys(self.target.as_ref(), &self.target_schema, probe)
        )?;
        self.events
            .emit(VerifyEvent::ForeignKeysLoaded {
                source: source.len(),
                target: target.len(),
            })
            .await;
        Ok((source, target))
    }

    async fn finish(
        &self,
        started_at: chrono::DateTime<Utc>,
        diff: TableListDiff,
        aborted: bool,
        reports: Vec<MismatchReport>,
    ) -> VerifyResult {
        let result = VerifyResult::new(
            started_at,
            self.config.check_foreign_keys,
            diff,
            aborted,
            reports,
        );
        self.events
            .emit(VerifyEvent::RunFinished {
                tables: result.reports.len(),
                mismatched: result.tables_mismatched,
            })
            .await;
        info!(
            "Verification finished in {}ms: {} matched, {} mismatched",
            result.duration_ms, result.tables_matched, result.tables_mismatched
        );
        result
    }
}

/// Base table names of `namespace` in catalog order.
///
/// # Errors
///
/// Catalog query failures are returned as [`VerifyError::Catalog`].
pub async fn list_tables(executor: &dyn QueryExecutor, namespace: &str) -> Result<Vec<String>> {
    let dialect = DialectImpl::for_engine(executor.engine());
    let rows = executor
        .execute(
            table_list_query(&dialect),
            &[SqlValue::Text(namespace.to_string())],
        )
        .await
        .map_err(into_catalog)?;

    rows.iter()
        .map(|row| match row.first() {
            Some(SqlValue::Text(name)) => Ok(name.clone()),
            Some(SqlValue::Bytes(b)) => Ok(String::from_utf8_lossy(b).into_owned()),
            other => Err(VerifyError::Catalog(format!(
                "{} table list returned {:?}",
                executor.engine(),
                other
            ))),
        })
        .collect()
}
