//! MySQL/MariaDB query executor.
//!
//! Uses SQLx with a single-connection pool so the whole run shares one
//! long-lived session. Rows are decoded generically from the column type
//! the server reports.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow,
    MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::{Engine, QueryExecutor, Row, SqlValue};
use crate::error::{Result, VerifyError};

/// Connection acquire timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Executor over one MySQL session.
pub struct MysqlExecutor {
    pool: MySqlPool,
    database: String,
}

impl MysqlExecutor {
    /// Open the session and check it with a trivial query.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(ssl_mode(&config.ssl_mode)?);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| VerifyError::connectivity(Engine::Mysql, e))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| VerifyError::connectivity(Engine::Mysql, e))?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Database (schema) name of this session.
    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl QueryExecutor for MysqlExecutor {
    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        debug!(params = params.len(), "MySQL: {}", sql);
        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, value| bind_value(query, value));

        let rows = query.fetch_all(&self.pool).await.map_err(map_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn ssl_mode(mode: &str) -> Result<MySqlSslMode> {
    match mode.to_lowercase().as_str() {
        "disabled" => Ok(MySqlSslMode::Disabled),
        "preferred" | "" => Ok(MySqlSslMode::Preferred),
        "required" => Ok(MySqlSslMode::Required),
        "verify-ca" => Ok(MySqlSslMode::VerifyCa),
        "verify-identity" => Ok(MySqlSslMode::VerifyIdentity),
        other => Err(VerifyError::Config(format!(
            "Invalid MySQL ssl_mode '{}'. Valid values: disabled, preferred, required, verify-ca, verify-identity",
            other
        ))),
    }
}

/// Session-level failures are connectivity errors, everything else is a
/// query error scoped to the statement.
fn map_error(e: sqlx::Error) -> VerifyError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => VerifyError::connectivity(Engine::Mysql, e),
        other => VerifyError::query("MySQL", other),
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::UInt(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
        // MySQL has no native UUID type; ids are stored as CHAR(36).
        SqlValue::Uuid(v) => query.bind(v.hyphenated().to_string()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeOffset(v) => query.bind(v.with_timezone(&Utc)),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut out = Row::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name().to_uppercase();
        let value = decode_value(row, idx, &type_name).map_err(|e| {
            VerifyError::query(format!("decoding MySQL column '{}'", column.name()), e)
        })?;
        out.push(column.name(), value);
    }
    Ok(out)
}

fn decode_value(
    row: &MySqlRow,
    idx: usize,
    type_name: &str,
) -> std::result::Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match type_name {
        "BOOLEAN" => SqlValue::Bool(row.try_get::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            SqlValue::Int(row.try_get::<i64, _>(idx)?)
        }
        t if t.ends_with("UNSIGNED") => SqlValue::UInt(row.try_get::<u64, _>(idx)?),
        "YEAR" => match row.try_get::<u16, _>(idx) {
            Ok(y) => SqlValue::UInt(y as u64),
            Err(_) => SqlValue::Text(row.try_get::<String, _>(idx)?),
        },
        "BIT" => SqlValue::UInt(row.try_get::<u64, _>(idx)?),
        "FLOAT" => SqlValue::F32(row.try_get::<f32, _>(idx)?),
        "DOUBLE" => SqlValue::F64(row.try_get::<f64, _>(idx)?),
        "DECIMAL" => SqlValue::Decimal(row.try_get::<rust_decimal::Decimal, _>(idx)?),
        "DATE" => SqlValue::Date(row.try_get::<NaiveDate, _>(idx)?),
        "TIME" => SqlValue::Time(row.try_get::<NaiveTime, _>(idx)?),
        "DATETIME" => SqlValue::DateTime(row.try_get::<NaiveDateTime, _>(idx)?),
        "TIMESTAMP" => {
            SqlValue::DateTimeOffset(row.try_get::<DateTime<Utc>, _>(idx)?.fixed_offset())
        }
        "JSON" => SqlValue::Json(row.try_get::<serde_json::Value, _>(idx)?),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY" => {
            SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?)
        }
        // CHAR, VARCHAR, TEXT variants, ENUM, SET and anything unrecognized
        _ => match row.try_get::<String, _>(idx) {
            Ok(s) => SqlValue::Text(s),
            Err(_) => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(ssl_mode("disabled").unwrap(), MySqlSslMode::Disabled));
        assert!(matches!(ssl_mode("PREFERRED").unwrap(), MySqlSslMode::Preferred));
        assert!(matches!(ssl_mode("verify-identity").unwrap(), MySqlSslMode::VerifyIdentity));
        assert!(ssl_mode("require").is_err());
    }

    #[test]
    fn test_session_errors_are_connectivity() {
        assert!(map_error(sqlx::Error::PoolTimedOut).is_transient());
        assert!(map_error(sqlx::Error::Protocol("eof".into())).is_transient());
        assert!(!map_error(sqlx::Error::RowNotFound).is_transient());
        assert!(!map_error(sqlx::Error::ColumnNotFound("id".into())).is_transient());
    }
}
