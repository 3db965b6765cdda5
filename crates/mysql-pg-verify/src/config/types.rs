//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::verify::normalize::TimestampRule;
use crate::verify::types::TableListPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (MySQL).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Reconciliation behavior configuration.
    #[serde(default)]
    pub verify: VerifyConfig,
}

/// Source database (MySQL/MariaDB) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "mysql" for now).
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name. Also the schema whose tables are enumerated.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password (never serialized).
    #[serde(default, skip_serializing)]
    pub password: String,

    /// SSL mode: disabled, preferred, required, verify-ca, verify-identity.
    #[serde(default = "default_preferred")]
    pub ssl_mode: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "postgres" for now).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password (never serialized).
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Target schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Reconciliation behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Compare foreign-key topology and referential value sets (default: false).
    #[serde(default)]
    pub check_foreign_keys: bool,

    /// Number of leading ids whose rows are compared column by column (default: 50).
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Pause between tables in milliseconds (default: 1000).
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,

    /// Which column names are parsed as timestamps. Defaults depend on
    /// `check_foreign_keys`, see [`VerifyConfig::timestamp_rule`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_rule: Option<TimestampRule>,

    /// What to do when the two table lists differ (default: common_subset).
    #[serde(default)]
    pub table_list_policy: TableListPolicy,

    /// Table used to discover the active PostgreSQL schema for foreign keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_probe_table: Option<String>,

    /// Per-query timeout in seconds (default: 60).
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,

    /// Deadline for the whole run in seconds. Unlimited if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_deadline_secs: Option<u64>,

    /// Retry policy for transient connection failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Append-only text log written by the CLI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            check_foreign_keys: false,
            sample_size: default_sample_size(),
            pacing_ms: default_pacing_ms(),
            timestamp_rule: None,
            table_list_policy: TableListPolicy::default(),
            schema_probe_table: None,
            query_timeout_secs: default_query_timeout_secs(),
            run_deadline_secs: None,
            retry: RetryConfig::default(),
            log_file: None,
        }
    }
}

impl VerifyConfig {
    /// Effective timestamp rule: explicit setting, else `Contains` when
    /// foreign keys are checked and `Exact` otherwise.
    pub fn timestamp_rule(&self) -> TimestampRule {
        self.timestamp_rule
            .unwrap_or_else(|| TimestampRule::for_mode(self.check_foreign_keys))
    }

    /// Delay between tables.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// Per-query timeout.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Run deadline, if any.
    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

/// Retry policy for transient connectivity errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt, doubled afterwards (default: 200ms).
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// Upper bound for a single backoff pause.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

impl RetryConfig {
    /// Backoff before attempt `attempt` (1-based; attempt 1 has none).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 2).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor)).min(MAX_BACKOFF)
    }
}

fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_preferred() -> String {
    "preferred".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_sample_size() -> usize {
    50
}

fn default_pacing_ms() -> u64 {
    1000
}

fn default_query_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_defaults() {
        let v = VerifyConfig::default();
        assert!(!v.check_foreign_keys);
        assert_eq!(v.sample_size, 50);
        assert_eq!(v.pacing(), Duration::from_secs(1));
        assert_eq!(v.table_list_policy, TableListPolicy::CommonSubset);
        assert_eq!(v.timestamp_rule(), TimestampRule::Exact);
        assert!(v.run_deadline().is_none());
    }

    #[test]
    fn test_timestamp_rule_follows_fk_mode() {
        let v = VerifyConfig {
            check_foreign_keys: true,
            ..Default::default()
        };
        assert_eq!(v.timestamp_rule(), TimestampRule::Contains);

        let v = VerifyConfig {
            check_foreign_keys: true,
            timestamp_rule: Some(TimestampRule::Exact),
            ..Default::default()
        };
        assert_eq!(v.timestamp_rule(), TimestampRule::Exact);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let r = RetryConfig {
            max_attempts: 10,
            initial_backoff_ms: 200,
        };
        assert_eq!(r.backoff_for(1), Duration::ZERO);
        assert_eq!(r.backoff_for(2), Duration::from_millis(200));
        assert_eq!(r.backoff_for(3), Duration::from_millis(400));
        assert_eq!(r.backoff_for(4), Duration::from_millis(800));
        assert_eq!(r.backoff_for(9), MAX_BACKOFF);
    }
}
