//! Catalog metadata types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single-column foreign-key reference as reported by a catalog.
///
/// Composite keys appear as several constraints with the same table and
/// referenced table. Equality is case-insensitive on all four fields, so
/// the derived `PartialEq` is deliberately not provided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    /// Referencing table.
    pub table: String,

    /// Referencing column.
    pub column: String,

    /// Referenced table.
    pub referenced_table: String,

    /// Referenced column.
    pub referenced_column: String,
}

impl ForeignKeyConstraint {
    /// Create a constraint tuple.
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        }
    }

    /// Lowercased 4-tuple used for set membership.
    pub fn key(&self) -> (String, String, String, String) {
        (
            self.table.to_lowercase(),
            self.column.to_lowercase(),
            self.referenced_table.to_lowercase(),
            self.referenced_column.to_lowercase(),
        )
    }

    /// Whether this constraint belongs to `table` (case-insensitive).
    pub fn is_on_table(&self, table: &str) -> bool {
        self.table.eq_ignore_ascii_case(table)
    }

    /// Case-insensitive equality on column, referenced table and referenced
    /// column. The owning table is assumed to match already.
    pub fn same_reference(&self, other: &ForeignKeyConstraint) -> bool {
        self.column.eq_ignore_ascii_case(&other.column)
            && self
                .referenced_table
                .eq_ignore_ascii_case(&other.referenced_table)
            && self
                .referenced_column
                .eq_ignore_ascii_case(&other.referenced_column)
    }
}

impl PartialEq for ForeignKeyConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.is_on_table(&other.table) && self.same_reference(other)
    }
}

impl Eq for ForeignKeyConstraint {}

impl fmt::Display for ForeignKeyConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.table, self.column, self.referenced_table, self.referenced_column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_case() {
        let a = ForeignKeyConstraint::new("orders", "user_id", "users", "id");
        let b = ForeignKeyConstraint::new("Orders", "USER_ID", "Users", "ID");
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_different_reference_not_equal() {
        let a = ForeignKeyConstraint::new("orders", "user_id", "users", "id");
        let b = ForeignKeyConstraint::new("orders", "user_id", "customers", "id");
        assert_ne!(a, b);
        assert!(!a.same_reference(&b));
    }

    #[test]
    fn test_display() {
        let fk = ForeignKeyConstraint::new("orders", "user_id", "users", "id");
        assert_eq!(fk.to_string(), "orders.user_id -> users.id");
    }
}
