//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific identifier quoting and parameter placeholders.

use crate::core::identifier::quote_pg;
use crate::core::traits::Dialect;
use crate::error::Result;

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}
