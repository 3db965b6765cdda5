//! SQL generation for reconciliation queries.
//!
//! Every statement the reconciler runs is built here. Table and column
//! names come from catalog results and always go through the dialect's
//! quoting; values (ids, schema names) are always bound parameters.

use crate::core::traits::Dialect;
use crate::drivers::DialectImpl;
use crate::error::Result;

/// Ordering and sampling key expected on every table.
pub const ID_COLUMN: &str = "id";

/// Alias of the single column returned by [`count_query`].
pub const COUNT_ALIAS: &str = "count";

/// Alias of the single column returned by [`distinct_values_query`].
pub const VALUE_ALIAS: &str = "value";

/// `SELECT COUNT(*)` over a table.
pub fn count_query(dialect: &DialectImpl, namespace: Option<&str>, table: &str) -> Result<String> {
    Ok(format!(
        "SELECT COUNT(*) AS {} FROM {}",
        COUNT_ALIAS,
        dialect.qualify(namespace, table)?
    ))
}

/// Every id of a table in ascending order.
pub fn id_list_query(dialect: &DialectImpl, namespace: Option<&str>, table: &str) -> Result<String> {
    let id = dialect.quote_ident(ID_COLUMN)?;
    Ok(format!(
        "SELECT {id} FROM {table} ORDER BY {id}",
        id = id,
        table = dialect.qualify(namespace, table)?
    ))
}

/// Full rows for `id_count` bound ids, ordered by id.
pub fn sample_query(
    dialect: &DialectImpl,
    namespace: Option<&str>,
    table: &str,
    id_count: usize,
) -> Result<String> {
    let id = dialect.quote_ident(ID_COLUMN)?;
    Ok(format!(
        "SELECT * FROM {table} WHERE {id} IN ({params}) ORDER BY {id}",
        table = dialect.qualify(namespace, table)?,
        id = id,
        params = dialect.placeholder_list(1, id_count)
    ))
}

/// Distinct non-null values of a referencing column.
pub fn distinct_values_query(
    dialect: &DialectImpl,
    namespace: Option<&str>,
    table: &str,
    column: &str,
) -> Result<String> {
    let col = dialect.quote_ident(column)?;
    Ok(format!(
        "SELECT DISTINCT {col} AS {alias} FROM {table} WHERE {col} IS NOT NULL",
        col = col,
        alias = VALUE_ALIAS,
        table = dialect.qualify(namespace, table)?
    ))
}

/// Base tables of a schema. Binds one parameter: the schema/database name.
pub fn table_list_query(dialect: &DialectImpl) -> &'static str {
    match dialect {
        // CAST to CHAR to handle collation differences in information_schema
        DialectImpl::Mysql(_) => {
            r#"SELECT CAST(TABLE_NAME AS CHAR(255)) AS table_name
FROM information_schema.tables
WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME"#
        }
        DialectImpl::Postgres(_) => {
            r#"SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name"#
        }
    }
}

/// Foreign-key columns of a schema, one row per referencing column.
/// Binds one parameter: the schema/database name.
pub fn foreign_key_query(dialect: &DialectImpl) -> &'static str {
    match dialect {
        DialectImpl::Mysql(_) => {
            r#"SELECT
    CAST(TABLE_NAME AS CHAR(255)) AS table_name,
    CAST(COLUMN_NAME AS CHAR(255)) AS column_name,
    CAST(REFERENCED_TABLE_NAME AS CHAR(255)) AS referenced_table,
    CAST(REFERENCED_COLUMN_NAME AS CHAR(255)) AS referenced_column
FROM information_schema.key_column_usage
WHERE TABLE_SCHEMA = ? AND REFERENCED_TABLE_NAME IS NOT NULL
ORDER BY TABLE_NAME, COLUMN_NAME"#
        }
        DialectImpl::Postgres(_) => {
            // conkey and confkey are parallel arrays; unnesting them together
            // pairs each column of a composite key with its referenced column.
            r#"SELECT
    cl.relname::text AS table_name,
    att.attname::text AS column_name,
    rcl.relname::text AS referenced_table,
    ratt.attname::text AS referenced_column
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class cl ON cl.oid = con.conrelid
JOIN pg_catalog.pg_namespace ns ON ns.oid = cl.relnamespace
JOIN pg_catalog.pg_class rcl ON rcl.oid = con.confrelid
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, position)
JOIN pg_catalog.pg_attribute att
    ON att.attrelid = con.conrelid AND att.attnum = k.attnum
JOIN pg_catalog.pg_attribute ratt
    ON ratt.attrelid = con.confrelid AND ratt.attnum = k.refnum
WHERE con.contype = 'f' AND ns.nspname = $1
ORDER BY cl.relname, att.attname"#
        }
    }
}

/// Schema holding a known table (PostgreSQL). Binds the table name.
pub const SCHEMA_PROBE_QUERY: &str = r#"SELECT table_schema::text AS table_schema
FROM information_schema.tables
WHERE table_name = $1
ORDER BY table_schema
LIMIT 1"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Engine;

    fn mysql() -> DialectImpl {
        DialectImpl::for_engine(Engine::Mysql)
    }

    fn pg() -> DialectImpl {
        DialectImpl::for_engine(Engine::Postgres)
    }

    #[test]
    fn test_count_query() {
        assert_eq!(
            count_query(&mysql(), None, "orders").unwrap(),
            "SELECT COUNT(*) AS count FROM `orders`"
        );
        assert_eq!(
            count_query(&pg(), Some("public"), "orders").unwrap(),
            "SELECT COUNT(*) AS count FROM \"public\".\"orders\""
        );
    }

    #[test]
    fn test_id_list_query() {
        assert_eq!(
            id_list_query(&mysql(), None, "users").unwrap(),
            "SELECT `id` FROM `users` ORDER BY `id`"
        );
    }

    #[test]
    fn test_sample_query_binds_every_id() {
        assert_eq!(
            sample_query(&mysql(), None, "users", 3).unwrap(),
            "SELECT * FROM `users` WHERE `id` IN (?, ?, ?) ORDER BY `id`"
        );
        assert_eq!(
            sample_query(&pg(), Some("public"), "users", 2).unwrap(),
            "SELECT * FROM \"public\".\"users\" WHERE \"id\" IN ($1, $2) ORDER BY \"id\""
        );
    }

    #[test]
    fn test_distinct_values_query() {
        assert_eq!(
            distinct_values_query(&pg(), Some("public"), "orders", "user_id").unwrap(),
            "SELECT DISTINCT \"user_id\" AS value FROM \"public\".\"orders\" WHERE \"user_id\" IS NOT NULL"
        );
    }

    #[test]
    fn test_hostile_identifiers_are_quoted() {
        let sql = count_query(&mysql(), None, "x`; DROP TABLE users; --").unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS count FROM `x``; DROP TABLE users; --`");
        let sql = count_query(&pg(), Some("public"), "x\"; DROP TABLE users; --").unwrap();
        assert!(sql.ends_with("\"x\"\"; DROP TABLE users; --\""));
        assert!(count_query(&pg(), None, "bad\0name").is_err());
    }

    #[test]
    fn test_catalog_queries_are_parameterized() {
        assert!(table_list_query(&mysql()).contains("TABLE_SCHEMA = ?"));
        assert!(table_list_query(&pg()).contains("table_schema = $1"));
        assert!(foreign_key_query(&mysql()).contains("REFERENCED_TABLE_NAME IS NOT NULL"));
        assert!(foreign_key_query(&pg()).contains("ns.nspname = $1"));
        assert!(SCHEMA_PROBE_QUERY.contains("$1"));
    }

    #[test]
    fn test_pg_composite_keys_pair_columns_by_position() {
        let sql = foreign_key_query(&pg());
        assert!(sql.contains("unnest(con.conkey, con.confkey) WITH ORDINALITY"));
        assert!(sql.contains("att.attnum = k.attnum"));
        assert!(sql.contains("ratt.attnum = k.refnum"));
        assert!(!sql.contains("constraint_column_usage"));
    }
}
