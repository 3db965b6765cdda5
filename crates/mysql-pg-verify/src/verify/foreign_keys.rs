//! Foreign-key extraction from engine catalogs.

use tracing::{debug, info};

use crate::core::{Engine, ForeignKeyConstraint, QueryExecutor, Row, SqlValue};
use crate::drivers::DialectImpl;
use crate::error::{Result, VerifyError};

use super::query::{foreign_key_query, SCHEMA_PROBE_QUERY};

/// List every single-column foreign-key reference in `namespace`.
///
/// For MySQL `namespace` is the database name. For PostgreSQL the schema is
/// first resolved by probing for `probe_table`; `namespace` is the fallback
/// when no probe table is configured or the probe finds nothing.
///
/// Composite keys yield one entry per column and are not deduplicated.
///
/// # Errors
///
/// Any catalog failure is run-fatal: query errors surface as
/// [`VerifyError::Catalog`], connectivity and timeout errors are kept as is.
pub async fn list_foreign_keys(
    executor: &dyn QueryExecutor,
    namespace: &str,
    probe_table: Option<&str>,
) -> Result<Vec<ForeignKeyConstraint>> {
    let engine = executor.engine();
    let schema = match engine {
        Engine::Mysql => namespace.to_string(),
        Engine::Postgres => resolve_schema(executor, namespace, probe_table).await?,
    };

    let dialect = DialectImpl::for_engine(engine);
    let rows = executor
        .execute(
            foreign_key_query(&dialect),
            &[SqlValue::Text(schema.clone())],
        )
        .await
        .map_err(into_catalog)?;

    let constraints = rows
        .iter()
        .map(constraint_from_row)
        .collect::<Result<Vec<_>>>()?;

    info!(
        "{}: {} foreign key column(s) in '{}'",
        engine,
        constraints.len(),
        schema
    );
    Ok(constraints)
}

/// Schema holding `probe_table`, or `fallback`.
pub async fn resolve_schema(
    executor: &dyn QueryExecutor,
    fallback: &str,
    probe_table: Option<&str>,
) -> Result<String> {
    let Some(table) = probe_table else {
        return Ok(fallback.to_string());
    };

    let rows = executor
        .execute(SCHEMA_PROBE_QUERY, &[SqlValue::Text(table.to_string())])
        .await
        .map_err(into_catalog)?;

    match rows.first().and_then(|r| r.first()) {
        Some(SqlValue::Text(schema)) if !schema.is_empty() => {
            debug!("Schema probe: table '{}' lives in '{}'", table, schema);
            Ok(schema.clone())
        }
        _ => {
            debug!(
                "Schema probe: table '{}' not found, using '{}'",
                table, fallback
            );
            Ok(fallback.to_string())
        }
    }
}

/// Catalog query errors are run-fatal.
pub(crate) fn into_catalog(e: VerifyError) -> VerifyError {
    match e {
        VerifyError::Query { context, message } => {
            VerifyError::Catalog(format!("{}: {}", context, message))
        }
        other => other,
    }
}

fn constraint_from_row(row: &Row) -> Result<ForeignKeyConstraint> {
    Ok(ForeignKeyConstraint::new(
        text(row, "table_name")?,
        text(row, "column_name")?,
        text(row, "referenced_table")?,
        text(row, "referenced_column")?,
    ))
}

fn text(row: &Row, column: &str) -> Result<String> {
    match row.get(column) {
        Some(SqlValue::Text(s)) => Ok(s.clone()),
        Some(SqlValue::Bytes(b)) => Ok(String::from_utf8_lossy(b).into_owned()),
        other => Err(VerifyError::Catalog(format!(
            "foreign key catalog returned {:?} for '{}'",
            other, column
        ))),
    }
}
