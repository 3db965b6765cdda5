//! Scripted in-memory [`QueryExecutor`] for reconciler tests.
//!
//! Recognizes the statements built by `verify::query`, serves them from
//! in-memory tables and records every `(sql, params)` call.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{Engine, ForeignKeyConstraint, QueryExecutor, Row, SqlValue};
use crate::error::{Result, VerifyError};

/// One executed statement.
#[derive(Debug, Clone)]
pub struct Call {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Clone)]
struct MockTable {
    name: String,
    rows: Vec<Row>,
    has_id: bool,
}

pub struct MockExecutor {
    engine: Engine,
    tables: Vec<MockTable>,
    foreign_keys: Vec<ForeignKeyConstraint>,
    probe_schema: Option<String>,
    failures: Vec<(String, fn(&str) -> VerifyError)>,
    calls: Mutex<Vec<Call>>,
}

impl MockExecutor {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            tables: Vec::new(),
            foreign_keys: Vec::new(),
            probe_schema: None,
            failures: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn mysql() -> Self {
        Self::new(Engine::Mysql)
    }

    pub fn postgres() -> Self {
        Self::new(Engine::Postgres)
    }

    /// Table whose rows are served in the given order (ascending id).
    pub fn table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.push(MockTable {
            name: name.to_string(),
            rows,
            has_id: true,
        });
        self
    }

    /// Table without an `id` column: id and sample queries fail.
    pub fn table_without_id(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.push(MockTable {
            name: name.to_string(),
            rows,
            has_id: false,
        });
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeyConstraint) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Schema returned by the PostgreSQL schema probe.
    pub fn probe_schema(mut self, schema: &str) -> Self {
        self.probe_schema = Some(schema.to_string());
        self
    }

    /// Fail every statement containing `needle` with a query error.
    pub fn fail_on(self, needle: &str) -> Self {
        self.fail_with(needle, |sql| VerifyError::query("mock", format!("failed: {}", sql)))
    }

    /// Fail every statement containing `needle` with a custom error.
    pub fn fail_with(mut self, needle: &str, error: fn(&str) -> VerifyError) -> Self {
        self.failures.push((needle.to_string(), error));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls whose SQL starts with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.sql.starts_with(prefix))
            .count()
    }

    /// Calls whose SQL starts with `SELECT *` (sampled rows).
    pub fn sample_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.sql.starts_with("SELECT * FROM"))
            .collect()
    }

    fn find_table(&self, sql: &str) -> Result<&MockTable> {
        let name = table_name_of(sql);
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| VerifyError::query("mock", format!("table '{}' doesn't exist", name)))
    }

    fn serve(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        if sql == "SELECT 1" {
            return Ok(vec![Row::new().with("1", 1i64)]);
        }
        if sql.contains("key_column_usage") || sql.contains("pg_constraint") {
            return Ok(self
                .foreign_keys
                .iter()
                .map(|fk| {
                    Row::new()
                        .with("table_name", fk.table.as_str())
                        .with("column_name", fk.column.as_str())
                        .with("referenced_table", fk.referenced_table.as_str())
                        .with("referenced_column", fk.referenced_column.as_str())
                })
                .collect());
        }
        if sql.starts_with("SELECT table_schema") {
            return Ok(self
                .probe_schema
                .iter()
                .map(|s| Row::new().with("table_schema", s.as_str()))
                .collect());
        }
        if sql.contains("information_schema.tables") {
            return Ok(self
                .tables
                .iter()
                .map(|t| Row::new().with("table_name", t.name.as_str()))
                .collect());
        }

        let table = self.find_table(sql)?;
        if sql.starts_with("SELECT COUNT(*)") {
            return Ok(vec![Row::new().with("count", table.rows.len() as i64)]);
        }
        if let Some(rest) = sql.strip_prefix("SELECT DISTINCT ") {
            let column = unquote(rest.split_whitespace().next().unwrap_or_default());
            let mut seen: Vec<SqlValue> = Vec::new();
            for row in &table.rows {
                match row.get(&column) {
                    Some(v) if !v.is_null() && !seen.contains(v) => seen.push(v.clone()),
                    _ => {}
                }
            }
            return Ok(seen
                .into_iter()
                .map(|v| Row::new().with("value", v))
                .collect());
        }

        if !table.has_id {
            return Err(VerifyError::query("mock", "Unknown column 'id'"));
        }
        if sql.starts_with("SELECT * FROM") {
            return Ok(table
                .rows
                .iter()
                .filter(|r| r.get("id").is_some_and(|id| params.contains(id)))
                .cloned()
                .collect());
        }
        // SELECT id ... ORDER BY id
        Ok(table
            .rows
            .iter()
            .map(|r| Row::new().with("id", r.get("id").cloned().unwrap_or(SqlValue::Null)))
            .collect())
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    fn engine(&self) -> Engine {
        self.engine
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Call {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
        }
        if let Some((_, error)) = self.failures.iter().find(|(needle, _)| sql.contains(needle)) {
            return Err(error(sql));
        }
        self.serve(sql, params)
    }

    async fn close(&self) {}
}

/// Last segment of the first token after ` FROM `, unquoted.
fn table_name_of(sql: &str) -> String {
    let after = sql.split(" FROM ").nth(1).unwrap_or_default();
    let token = after.split_whitespace().next().unwrap_or_default();
    unquote(token.rsplit('.').next().unwrap_or_default())
}

fn unquote(s: &str) -> String {
    s.trim_matches(|c| c == '`' || c == '"').to_string()
}

/// Rows `id = 1..=n` with a name column.
pub fn numbered_rows(n: i64) -> Vec<Row> {
    (1..=n)
        .map(|i| Row::new().with("id", i).with("name", format!("item {}", i)))
        .collect()
}
