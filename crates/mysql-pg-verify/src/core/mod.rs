//! Core abstractions for engine-agnostic reconciliation.
//!
//! - [`value`]: owned cell values and result rows
//! - [`schema`]: catalog metadata (foreign-key constraints)
//! - [`traits`]: [`QueryExecutor`] and [`Dialect`] seams
//! - [`identifier`]: identifier validation and quoting
//!
//! Driver modules (`drivers/mysql`, `drivers/postgres`) implement these
//! traits; the `verify` module consumes them.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::ForeignKeyConstraint;
pub use traits::{Dialect, Engine, QueryExecutor};
pub use value::{Row, SqlValue};
