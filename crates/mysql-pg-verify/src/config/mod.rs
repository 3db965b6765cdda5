//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 fingerprint of the configuration (passwords excluded).
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::types::TableListPolicy;

    const MINIMAL: &str = r#"
source:
  host: localhost
  database: store
  user: root
  password: "1"
target:
  host: localhost
  database: laravel8
  user: postgres
  password: "1"
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "public");
        assert_eq!(config.verify.sample_size, 50);
        assert_eq!(config.verify.pacing_ms, 1000);
        assert_eq!(config.verify.table_list_policy, TableListPolicy::CommonSubset);
    }

    #[test]
    fn test_from_yaml_reads_verify_section() {
        let yaml = format!(
            "{}verify:\n  check_foreign_keys: true\n  table_list_policy: abort\n  timestamp_rule: exact\n  run_deadline_secs: 600\n",
            MINIMAL
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert!(config.verify.check_foreign_keys);
        assert_eq!(config.verify.table_list_policy, TableListPolicy::Abort);
        assert_eq!(config.verify.run_deadline_secs, Some(600));
    }

    #[test]
    fn test_password_not_serialized() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("password"));
    }

    #[test]
    fn test_hash_is_stable() {
        let a = Config::from_yaml(MINIMAL).unwrap();
        let b = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
    }
}
