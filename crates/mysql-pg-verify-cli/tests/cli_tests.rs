//! CLI integration tests for mysql-pg-verify.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for configuration errors. None of them needs a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mysql-pg-verify binary.
fn cmd() -> Command {
    Command::cargo_bin("mysql-pg-verify").unwrap()
}

/// Write `content` to a temporary config file.
fn config_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", content).unwrap();
    file
}

const VALID_CONFIG: &str = r#"
source:
  host: 127.0.0.1
  database: store
  user: root
  password: secret
target:
  host: 127.0.0.1
  database: laravel8
  user: postgres
  password: secret
"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("tables"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--check-foreign-keys"))
        .stdout(predicate::str::contains("--sample-size"))
        .stdout(predicate::str::contains("--pacing-ms"))
        .stdout(predicate::str::contains("--log-file"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mysql-pg-verify"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let file = config_file("invalid: yaml: content: [\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let file = config_file("source:\n  type: mysql\n");

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_wrong_source_type_exits_with_code_1() {
    let file = config_file(&VALID_CONFIG.replace("source:\n", "source:\n  type: mssql\n"));

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("mysql"));
}

#[test]
fn test_zero_sample_size_override_exits_with_code_1() {
    let file = config_file(VALID_CONFIG);

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--sample-size",
            "0",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sample_size"));
}

#[test]
fn test_unknown_table_list_policy_exits_with_code_1() {
    let config = format!("{}verify:\n  table_list_policy: skip_everything\n", VALID_CONFIG);
    let file = config_file(&config);

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "tables"])
        .assert()
        .code(1);
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test database connections"));
}

#[test]
fn test_tables_command_exists() {
    cmd()
        .args(["tables", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("table lists"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    // -c should work as short for --config
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
