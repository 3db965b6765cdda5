//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Provides MySQL-specific identifier quoting and parameter placeholders.

use crate::core::identifier::quote_mysql;
use crate::core::traits::Dialect;
use crate::error::Result;

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
    }

    fn param_placeholder(&self, _index: usize) -> String {
        // MySQL uses positional ? placeholders
        "?".to_string()
    }
}
