//! # mysql-pg-verify
//!
//! Post-migration reconciliation of a MySQL/MariaDB source against a
//! PostgreSQL target.
//!
//! For every table the engine checks, in order and stopping at the first
//! difference:
//!
//! - **Row counts** on both sides
//! - **Id sets** (`SELECT id ... ORDER BY id`), when the table has an `id`
//! - **Sampled rows**: the first ids, compared column by column after
//!   normalization (timestamps in UTC, typed scalars as text)
//! - **Foreign keys** (optional): constraint topology and the distinct
//!   values of every referencing column
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_pg_verify::{Config, VerifyEngine};
//!
//! #[tokio::main]
//! async fn main() -> mysql_pg_verify::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let engine = VerifyEngine::connect(config).await?;
//!     let result = engine.reconcile_all().await;
//!     engine.close().await;
//!     for report in result?.failures() {
//!         println!("{}: {}", report.table, report.reason);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod health;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, RetryConfig, SourceConfig, TargetConfig, VerifyConfig};
pub use core::{Engine, ForeignKeyConstraint, QueryExecutor, Row, SqlValue};
pub use error::{Result, VerifyError};
pub use health::{health_check, HealthCheckResult};
pub use verify::{
    MismatchReport, TableListDiff, TableListPolicy, TableLists, TimestampRule, VerifyEngine,
    VerifyEvent, VerifyResult,
};
