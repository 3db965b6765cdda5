//! Database driver implementations.
//!
//! This module provides engine-specific implementations of the core traits:
//!
//! - [`mysql`]: MySQL/MariaDB session over sqlx (migration source)
//! - [`postgres`]: PostgreSQL session over tokio-postgres (migration target)
//! - [`common`]: Shared utilities (TLS, timeout and retry)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: SQL syntax strategy for the database engine
//! - `QueryExecutor`: runs SQL and decodes rows into [`crate::core::Row`]

pub mod common;
pub mod mysql;
pub mod postgres;

pub use common::{GuardedExecutor, SslMode, TlsBuilder};
pub use mysql::{MysqlDialect, MysqlExecutor};
pub use postgres::{PostgresDialect, PostgresExecutor};

use crate::core::traits::{Dialect, Engine};
use crate::error::{Result, VerifyError};

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Mysql(MysqlDialect),
    Postgres(PostgresDialect),
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Mysql(d) => d.name(),
            DialectImpl::Postgres(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        match self {
            DialectImpl::Mysql(d) => d.quote_ident(name),
            DialectImpl::Postgres(d) => d.quote_ident(name),
        }
    }

    fn param_placeholder(&self, index: usize) -> String {
        match self {
            DialectImpl::Mysql(d) => d.param_placeholder(index),
            DialectImpl::Postgres(d) => d.param_placeholder(index),
        }
    }
}

impl DialectImpl {
    /// Dialect for an engine.
    pub fn for_engine(engine: Engine) -> Self {
        match engine {
            Engine::Mysql => DialectImpl::Mysql(MysqlDialect::new()),
            Engine::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
        }
    }

    /// Create a dialect implementation from a database type string.
    ///
    /// # Errors
    ///
    /// Returns an error if the database type is not recognized.
    pub fn from_db_type(db_type: &str) -> Result<Self> {
        match db_type.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DialectImpl::Mysql(MysqlDialect::new())),
            "postgres" | "postgresql" | "pg" => Ok(DialectImpl::Postgres(PostgresDialect::new())),
            other => Err(VerifyError::Config(format!(
                "Unknown database type: '{}'. Supported types: mysql, postgres",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_impl_from_db_type() {
        assert_eq!(DialectImpl::from_db_type("mysql").unwrap().name(), "mysql");
        assert_eq!(DialectImpl::from_db_type("postgres").unwrap().name(), "postgres");

        // Alternative names
        assert!(DialectImpl::from_db_type("MariaDB").is_ok());
        assert!(DialectImpl::from_db_type("postgresql").is_ok());
        assert!(DialectImpl::from_db_type("pg").is_ok());

        assert!(DialectImpl::from_db_type("mssql").is_err());
    }

    #[test]
    fn test_dialect_impl_dispatch() {
        let dialect = DialectImpl::for_engine(Engine::Postgres);
        assert_eq!(dialect.name(), "postgres");
        assert_eq!(dialect.quote_ident("table").unwrap(), "\"table\"");
        assert_eq!(dialect.param_placeholder(1), "$1");

        let dialect = DialectImpl::for_engine(Engine::Mysql);
        assert_eq!(dialect.quote_ident("table").unwrap(), "`table`");
        assert_eq!(dialect.param_placeholder(1), "?");
    }
}
