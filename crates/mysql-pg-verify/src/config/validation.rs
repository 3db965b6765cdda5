//! Configuration validation.

use super::Config;
use crate::drivers::DialectImpl;
use crate::error::{Result, VerifyError};

const MYSQL_SSL_MODES: &[&str] = &[
    "disabled",
    "preferred",
    "required",
    "verify-ca",
    "verify-identity",
];

const PG_SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(VerifyError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(VerifyError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(VerifyError::Config("source.user is required".into()));
    }
    if !matches!(
        DialectImpl::from_db_type(&config.source.r#type)?,
        DialectImpl::Mysql(_)
    ) {
        return Err(VerifyError::Config(format!(
            "source.type must be 'mysql' or 'mariadb', got '{}'",
            config.source.r#type
        )));
    }
    if !MYSQL_SSL_MODES.contains(&config.source.ssl_mode.to_lowercase().as_str()) {
        return Err(VerifyError::Config(format!(
            "source.ssl_mode '{}' is invalid. Valid options: {}",
            config.source.ssl_mode,
            MYSQL_SSL_MODES.join(", ")
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(VerifyError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(VerifyError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(VerifyError::Config("target.user is required".into()));
    }
    if config.target.schema.is_empty() {
        return Err(VerifyError::Config("target.schema is required".into()));
    }
    if !matches!(
        DialectImpl::from_db_type(&config.target.r#type)?,
        DialectImpl::Postgres(_)
    ) {
        return Err(VerifyError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }
    if !PG_SSL_MODES.contains(&config.target.ssl_mode.to_lowercase().as_str()) {
        return Err(VerifyError::Config(format!(
            "target.ssl_mode '{}' is invalid. Valid options: {}",
            config.target.ssl_mode,
            PG_SSL_MODES.join(", ")
        )));
    }

    // Verify section
    let verify = &config.verify;
    if verify.sample_size == 0 {
        return Err(VerifyError::Config(
            "verify.sample_size must be at least 1".into(),
        ));
    }
    if verify.query_timeout_secs == 0 {
        return Err(VerifyError::Config(
            "verify.query_timeout_secs must be at least 1".into(),
        ));
    }
    if let Some(0) = verify.run_deadline_secs {
        return Err(VerifyError::Config(
            "verify.run_deadline_secs must be at least 1".into(),
        ));
    }
    if verify.retry.max_attempts == 0 {
        return Err(VerifyError::Config(
            "verify.retry.max_attempts must be at least 1".into(),
        ));
    }
    if let Some(ref probe) = verify.schema_probe_table {
        crate::core::identifier::validate_identifier(probe).map_err(|e| {
            VerifyError::Config(format!("verify.schema_probe_table: {}", e))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceConfig, TargetConfig, VerifyConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                r#type: "mysql".to_string(),
                host: "localhost".to_string(),
                port: 3306,
                database: "store".to_string(),
                user: "root".to_string(),
                password: "password".to_string(),
                ssl_mode: "preferred".to_string(),
            },
            target: TargetConfig {
                r#type: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database: "laravel8".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
            },
            verify: VerifyConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_source_type() {
        let mut config = valid_config();
        config.source.r#type = "mssql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_engine_aliases_accepted() {
        let mut config = valid_config();
        config.source.r#type = "MariaDB".to_string();
        config.target.r#type = "postgresql".to_string();
        assert!(validate(&config).is_ok());

        config.source.r#type = "pg".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("source.type"));
    }

    #[test]
    fn test_wrong_target_type() {
        let mut config = valid_config();
        config.target.r#type = "mysql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_modes() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.source.ssl_mode = "require".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_sample_size_rejected() {
        let mut config = valid_config();
        config.verify.sample_size = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("sample_size"));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let mut config = valid_config();
        config.verify.retry.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_probe_table_is_config_error() {
        let mut config = valid_config();
        config.verify.schema_probe_table = Some("users\0".to_string());
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, VerifyError::Config(_)));
        assert!(err.to_string().contains("schema_probe_table"));
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_123"));
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_password_456"));
    }
}
