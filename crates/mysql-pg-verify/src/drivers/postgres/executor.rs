//! PostgreSQL query executor.
//!
//! Uses deadpool-postgres with a pool of one connection, so every query of
//! a run goes through the same session. Parameters are converted to the
//! types the server inferred for the prepared statement, which lets ids
//! decoded from an `int4` column be bound back into an `int4` comparison.

use std::error::Error as StdError;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, Kind, ToSql, Type};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::{Engine, QueryExecutor, Row, SqlValue};
use crate::drivers::common::{SslMode, TlsBuilder};
use crate::error::{Result, VerifyError};

type BoxedParam = Box<dyn ToSql + Sync + Send>;

fn boxed<T: ToSql + Sync + Send + 'static>(value: T) -> BoxedParam {
    Box::new(value)
}

/// Executor over one PostgreSQL session.
pub struct PostgresExecutor {
    pool: Pool,
    schema: String,
}

impl PostgresExecutor {
    /// Open the session and check it with a trivial query.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("mysql-pg-verify");

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode: SslMode = config.ssl_mode.parse()?;
        let mgr = match TlsBuilder::new(ssl_mode).build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| VerifyError::connectivity(Engine::Postgres, e))?;

        let client = pool
            .get()
            .await
            .map_err(|e| VerifyError::connectivity(Engine::Postgres, e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| VerifyError::connectivity(Engine::Postgres, e))?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    /// Configured target schema.
    pub fn schema(&self) -> &str {
        &self.schema
    }
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        debug!(params = params.len(), "PostgreSQL: {}", sql);
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| VerifyError::connectivity(Engine::Postgres, e))?;

        let statement = client.prepare_cached(sql).await.map_err(map_error)?;
        let bound = params
            .iter()
            .zip(statement.params())
            .map(|(value, ty)| to_param(value, ty))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = bound
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let rows = client.query(&statement, &refs).await.map_err(map_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn close(&self) {
        self.pool.close();
    }
}

fn map_error(e: tokio_postgres::Error) -> VerifyError {
    if e.as_db_error().is_none() && e.is_closed() {
        VerifyError::connectivity(Engine::Postgres, e)
    } else {
        let message = match e.as_db_error() {
            Some(db) => db.message().to_string(),
            None => e.to_string(),
        };
        VerifyError::query("PostgreSQL", message)
    }
}

/// NULL accepted for any parameter type.
#[derive(Debug)]
struct Null;

impl ToSql for Null {
    fn to_sql(
        &self,
        _ty: &Type,
        _out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        Ok(IsNull::Yes)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Convert a value to a parameter of the server-inferred type `ty`.
fn to_param(value: &SqlValue, ty: &Type) -> Result<BoxedParam> {
    let mismatch = || {
        VerifyError::query(
            "binding PostgreSQL parameter",
            format!("cannot bind {} value as {}", value.type_name(), ty),
        )
    };

    let param = match value {
        SqlValue::Null => boxed(Null),
        SqlValue::Int(v) => int_param(*v as i128, ty).ok_or_else(mismatch)?,
        SqlValue::UInt(v) => int_param(*v as i128, ty).ok_or_else(mismatch)?,
        SqlValue::Text(s) => match *ty {
            Type::INT2 | Type::INT4 | Type::INT8 | Type::NUMERIC => s
                .trim()
                .parse::<i128>()
                .ok()
                .and_then(|v| int_param(v, ty))
                .ok_or_else(mismatch)?,
            Type::UUID => boxed(uuid::Uuid::parse_str(s).map_err(|_| mismatch())?),
            _ => boxed(s.clone()),
        },
        SqlValue::Uuid(v) => match *ty {
            Type::UUID => boxed(*v),
            _ => boxed(v.hyphenated().to_string()),
        },
        SqlValue::Bool(v) => boxed(*v),
        SqlValue::F32(v) => match *ty {
            Type::FLOAT8 => boxed(*v as f64),
            _ => boxed(*v),
        },
        SqlValue::F64(v) => boxed(*v),
        SqlValue::Decimal(v) => boxed(*v),
        SqlValue::Bytes(v) => boxed(v.clone()),
        SqlValue::Date(v) => boxed(*v),
        SqlValue::Time(v) => boxed(*v),
        SqlValue::DateTime(v) => match *ty {
            Type::TIMESTAMPTZ => boxed(v.and_utc()),
            _ => boxed(*v),
        },
        SqlValue::DateTimeOffset(v) => boxed(*v),
        SqlValue::Json(v) => boxed(v.clone()),
    };
    Ok(param)
}

fn int_param(v: i128, ty: &Type) -> Option<BoxedParam> {
    let param = match *ty {
        Type::INT2 => boxed(i16::try_from(v).ok()?),
        Type::INT4 => boxed(i32::try_from(v).ok()?),
        Type::OID => boxed(u32::try_from(v).ok()?),
        Type::NUMERIC => boxed(Decimal::from_i128_with_scale(v, 0)),
        Type::FLOAT4 => boxed(v as f32),
        Type::FLOAT8 => boxed(v as f64),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR => boxed(v.to_string()),
        _ => boxed(i64::try_from(v).ok()?),
    };
    Some(param)
}

/// Text label of a user-defined enum value.
struct EnumLabel(String);

impl<'a> FromSql<'a> for EnumLabel {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn StdError + Sync + Send>> {
        Ok(EnumLabel(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut out = Row::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_()).map_err(|e| {
            VerifyError::query(
                format!("decoding PostgreSQL column '{}'", column.name()),
                e,
            )
        })?;
        out.push(column.name(), value);
    }
    Ok(out)
}

fn decode_value(
    row: &tokio_postgres::Row,
    idx: usize,
    ty: &Type,
) -> std::result::Result<SqlValue, tokio_postgres::Error> {
    fn get<'a, T: FromSql<'a>>(
        row: &'a tokio_postgres::Row,
        idx: usize,
    ) -> std::result::Result<Option<T>, tokio_postgres::Error> {
        row.try_get::<_, Option<T>>(idx)
    }

    let value: SqlValue = match *ty {
        Type::BOOL => get::<bool>(row, idx)?.into(),
        Type::INT2 => get::<i16>(row, idx)?.map(|v| SqlValue::Int(v as i64)).into(),
        Type::INT4 => get::<i32>(row, idx)?.into(),
        Type::INT8 => get::<i64>(row, idx)?.into(),
        Type::OID => get::<u32>(row, idx)?.map(|v| SqlValue::UInt(v as u64)).into(),
        Type::FLOAT4 => get::<f32>(row, idx)?.map(SqlValue::F32).into(),
        Type::FLOAT8 => get::<f64>(row, idx)?.into(),
        Type::NUMERIC => get::<Decimal>(row, idx)?.into(),
        Type::BYTEA => get::<Vec<u8>>(row, idx)?.map(SqlValue::Bytes).into(),
        Type::UUID => get::<uuid::Uuid>(row, idx)?.into(),
        Type::DATE => get::<NaiveDate>(row, idx)?.into(),
        Type::TIME => get::<NaiveTime>(row, idx)?.map(SqlValue::Time).into(),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx)?.into(),
        Type::TIMESTAMPTZ => get::<DateTime<FixedOffset>>(row, idx)?.into(),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx)?
            .map(SqlValue::Json)
            .into(),
        _ if matches!(ty.kind(), Kind::Enum(_)) => {
            get::<EnumLabel>(row, idx)?.map(|l| SqlValue::Text(l.0)).into()
        }
        _ => get::<String>(row, idx)?.into(),
    };
    Ok(value)
}
