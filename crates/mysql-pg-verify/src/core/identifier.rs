//! Identifier validation and quoting for SQL injection prevention.
//!
//! Table and column names cannot be bound as parameters, so every
//! identifier that reaches SQL text goes through this module. Names are
//! only ever taken from catalog query results, never from user input, and
//! are still validated and quoted:
//!
//! 1. Reject suspicious identifiers (empty, NUL bytes, excessive length)
//! 2. Apply engine-specific quoting (backticks or double quotes)
//! 3. Escape the quote character inside the name

use crate::error::{Result, VerifyError};

/// Maximum identifier length in bytes.
/// - PostgreSQL: 63 bytes
/// - MySQL: 64 characters, up to 4 bytes each in utf8mb4
pub const MAX_IDENTIFIER_LENGTH: usize = 256;

/// Validate an identifier for security issues.
///
/// # Errors
///
/// Returns `VerifyError::Identifier` with a descriptive message. The
/// error is scoped to the table that carries the name.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VerifyError::Identifier(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(VerifyError::Identifier(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(VerifyError::Identifier(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("order_items").is_ok());
        assert!(validate_identifier("column with spaces").is_ok());
        assert!(validate_identifier("jadvallar").is_ok());
        assert!(validate_identifier("日本語").is_ok());
        // 64 four-byte characters: the longest name MySQL accepts.
        assert!(validate_identifier(&"𝔸".repeat(64)).is_ok());
        assert!(validate_identifier(&"表".repeat(50)).is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_length_boundary() {
        assert!(validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
        let result = validate_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1));
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_quote_pg() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("a\"b\"c").unwrap(), "\"a\"\"b\"\"c\"");
        assert_eq!(
            quote_pg("Robert'); DROP TABLE Students;--").unwrap(),
            "\"Robert'); DROP TABLE Students;--\""
        );
        assert!(quote_pg("table\0name").is_err());
    }

    #[test]
    fn test_quote_mysql() {
        assert_eq!(quote_mysql("users").unwrap(), "`users`");
        assert_eq!(quote_mysql("a`b`c").unwrap(), "`a``b``c`");
        assert_eq!(
            quote_mysql("Robert`); DROP TABLE Students;--").unwrap(),
            "`Robert``); DROP TABLE Students;--`"
        );
        assert!(quote_mysql("").is_err());
    }
}
