//! PostgreSQL driver (migration target).
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PostgresExecutor`]: read-only query session

mod dialect;
mod executor;

pub use dialect::PostgresDialect;
pub use executor::PostgresExecutor;
