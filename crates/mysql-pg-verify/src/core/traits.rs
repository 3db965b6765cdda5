//! Core traits for engine-agnostic reconciliation.
//!
//! - [`QueryExecutor`]: runs SQL against one live session and returns rows
//! - [`Dialect`]: SQL syntax strategy (identifier quoting, placeholders)
//!
//! The reconciliation engine only ever talks to these two abstractions,
//! which keeps it testable with in-memory executors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

use super::value::{Row, SqlValue};

/// The two relational engines this crate reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// MySQL / MariaDB (migration source).
    Mysql,
    /// PostgreSQL (migration target).
    Postgres,
}

impl Engine {
    /// Short identifier (e.g., "mysql", "postgres").
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Mysql => "mysql",
            Engine::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Mysql => write!(f, "MySQL"),
            Engine::Postgres => write!(f, "PostgreSQL"),
        }
    }
}

/// Run queries against one engine.
///
/// Implementations own a single long-lived session for the duration of a
/// run. Queries are read-only.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Engine this executor talks to.
    fn engine(&self) -> Engine;

    /// Execute `sql` with positional `params` and return every row.
    ///
    /// Placeholders follow the engine's [`Dialect`].
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>>;

    /// Round-trip a trivial query to check the session is alive.
    async fn ping(&self) -> Result<()> {
        self.execute("SELECT 1", &[]).await.map(|_| ())
    }

    /// Release the session. Called exactly once at shutdown.
    async fn close(&self);
}

/// SQL syntax strategy for different database engines.
///
/// # Design Pattern
///
/// This is a **Strategy** pattern - different implementations provide
/// interchangeable SQL syntax rules.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "mysql", "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    ///
    /// - MySQL: `` `identifier` ``
    /// - PostgreSQL: `"identifier"`
    ///
    /// # Errors
    ///
    /// Fails for identifiers that do not pass validation.
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Get a parameter placeholder for the given 1-based index.
    ///
    /// - MySQL: `?`
    /// - PostgreSQL: `$1`, `$2`, etc.
    fn param_placeholder(&self, index: usize) -> String;

    /// Quote `table`, qualified with `namespace` when one is given.
    fn qualify(&self, namespace: Option<&str>, table: &str) -> Result<String> {
        match namespace {
            Some(ns) => Ok(format!("{}.{}", self.quote_ident(ns)?, self.quote_ident(table)?)),
            None => self.quote_ident(table),
        }
    }

    /// Comma-separated placeholders for `count` params starting at `start`.
    fn placeholder_list(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|i| self.param_placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
