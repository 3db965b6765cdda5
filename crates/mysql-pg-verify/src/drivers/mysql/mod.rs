//! MySQL/MariaDB database driver (migration source).
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: SQL syntax strategy
//! - [`MysqlExecutor`]: read-only query session
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod dialect;
mod executor;

pub use dialect::MysqlDialect;
pub use executor::MysqlExecutor;
