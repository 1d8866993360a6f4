//! CLI integration tests for dbmaintain.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for configuration errors. None of them needs a database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the dbmaintain binary.
fn cmd() -> Command {
    Command::cargo_bin("dbmaintain").unwrap()
}

fn config_file(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{}", yaml).unwrap();
    file
}

const VALID: &str = r#"
database:
  host: localhost
  database: app
  user: app
scripts:
  qualifiers: [slow]
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
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("mark-up-to-date"))
        .stdout(predicate::str::contains("clear"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("disable-constraints"))
        .stdout(predicate::str::contains("mark-error-scripts-successful"))
        .stdout(predicate::str::contains("remove-error-scripts"))
        .stdout(predicate::str::contains("validate-config"));
}

#[test]
fn test_update_subcommand_help() {
    cmd()
        .args(["update", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dbmaintain"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: dbmaintain.yaml]"));
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

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// validate-config
// =============================================================================

#[test]
fn test_validate_config_accepts_valid_file() {
    let file = config_file(VALID);
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("postgres"));
}

#[test]
fn test_validate_config_json_output() {
    let file = config_file(VALID);
    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--output-json",
            "validate-config",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_1() {
    // Missing file is an IO error, not a configuration error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate-config"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let file = config_file("invalid: yaml: content: [\n");
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let file = config_file("database:\n  host: localhost\n");
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "status"])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_dialect_exits_with_code_2() {
    let file = config_file(&format!("{}  dialect: sybase\n", VALID.replace("scripts:\n  qualifiers: [slow]\n", "")));
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("sybase"));
}

#[test]
fn test_unregistered_qualifier_exits_with_code_2() {
    let file = config_file(&format!("{}  exclude_qualifiers: [nightly]\n", VALID));
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate-config"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nightly"));
}

#[test]
fn test_update_without_live_driver_exits_with_code_2() {
    let file = config_file(&format!(
        "{}  dialect: oracle\n",
        VALID.replace("scripts:\n  qualifiers: [slow]\n", "")
    ));
    cmd()
        .args(["--config", file.path().to_str().unwrap(), "update", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("only postgres"));
}
