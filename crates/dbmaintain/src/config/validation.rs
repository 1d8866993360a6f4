//! Configuration validation.

use super::Config;
use crate::core::{DialectCatalog, UNQUALIFIED};
use crate::error::{MaintainError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Database validation
    if config.database.host.is_empty() {
        return Err(MaintainError::Config("database.host is required".into()));
    }
    if config.database.database.is_empty() {
        return Err(MaintainError::Config("database.database is required".into()));
    }
    if config.database.user.is_empty() {
        return Err(MaintainError::Config("database.user is required".into()));
    }
    if config.database.name.trim().is_empty() {
        return Err(MaintainError::Config("database.name cannot be empty".into()));
    }
    let catalog = DialectCatalog::with_builtins();
    let dialect = catalog.require(&config.database.dialect)?;
    if config.database.schemas.is_empty() {
        return Err(MaintainError::Config(
            "database.schemas must list at least one schema".into(),
        ));
    }
    if config.database.max_connections == 0 {
        return Err(MaintainError::Config(
            "database.max_connections must be at least 1".into(),
        ));
    }

    // Script repository validation
    let scripts = &config.scripts;
    if scripts.locations.is_empty() {
        return Err(MaintainError::Config(
            "scripts.locations must list at least one directory".into(),
        ));
    }
    if scripts.extensions.iter().all(|e| e.trim().is_empty()) {
        return Err(MaintainError::Config(
            "scripts.extensions must list at least one extension".into(),
        ));
    }
    if scripts.qualifier_prefix.is_empty() || scripts.target_database_prefix.is_empty() {
        return Err(MaintainError::Config(
            "scripts.qualifier_prefix and scripts.target_database_prefix cannot be empty".into(),
        ));
    }
    if scripts.qualifier_prefix == scripts.target_database_prefix {
        return Err(MaintainError::Config(format!(
            "scripts.qualifier_prefix and scripts.target_database_prefix must differ (both '{}')",
            scripts.qualifier_prefix
        )));
    }
    for qualifier in scripts.qualifiers.iter().chain(&scripts.patch_qualifiers) {
        validate_qualifier_name(qualifier)?;
    }
    if scripts.runner == super::RunnerKind::Cli && scripts.cli_command.is_empty() {
        return Err(MaintainError::Config(
            "scripts.cli_command is required when scripts.runner is 'cli'".into(),
        ));
    }

    // Include/exclude lists reference registered qualifiers only
    config.qualifier_evaluator()?;
    config.baseline()?;

    // Registry table name ends up in DDL
    crate::core::identifier::validate_identifier(&config.executed_scripts.table)?;

    // Preserve entries must parse with the dialect's identifier case
    config.preserve_set(dialect.identifier_case)?;

    Ok(())
}

fn validate_qualifier_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MaintainError::Config("Qualifier names cannot be empty".into()));
    }
    if name == UNQUALIFIED {
        return Err(MaintainError::Config(format!(
            "'{}' is reserved and cannot be registered as a qualifier",
            UNQUALIFIED
        )));
    }
    if name.contains(['_', ',', '/', '\\']) || name.chars().any(char::is_whitespace) {
        return Err(MaintainError::Config(format!(
            "Qualifier '{}' may not contain '_', ',', path separators or whitespace",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatabaseConfig, ExecutedScriptsConfig, PreserveConfig, ScriptsConfig,
    };

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                name: "default".to_string(),
                dialect: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database: "app".to_string(),
                user: "app".to_string(),
                password: "password".to_string(),
                schemas: vec!["public".to_string()],
                max_connections: 2,
            },
            scripts: ScriptsConfig {
                qualifiers: vec!["slow".to_string()],
                ..Default::default()
            },
            executed_scripts: ExecutedScriptsConfig::default(),
            preserve: PreserveConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.database.host = String::new();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("database.host"));
    }

    #[test]
    fn test_unknown_dialect() {
        let mut config = valid_config();
        config.database.dialect = "sybase".to_string();
        assert!(matches!(validate(&config), Err(MaintainError::Config(_))));
    }

    #[test]
    fn test_unregistered_excluded_qualifier() {
        let mut config = valid_config();
        config.scripts.exclude_qualifiers = vec!["nightly".to_string()];
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("nightly"));
    }

    #[test]
    fn test_unqualified_sentinel_is_accepted() {
        let mut config = valid_config();
        config.scripts.include_qualifiers = vec![UNQUALIFIED.to_string()];
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_qualifier_with_separator_is_rejected() {
        let mut config = valid_config();
        config.scripts.qualifiers = vec!["very_slow".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_prefixes_must_differ() {
        let mut config = valid_config();
        config.scripts.target_database_prefix = "#".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_baseline() {
        let mut config = valid_config();
        config.scripts.baseline_revision = Some("1.two".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_malformed_preserve_entry() {
        let mut config = valid_config();
        config.preserve.tables = vec!["a.b.c".to_string()];
        assert!(matches!(validate(&config), Err(MaintainError::Config(_))));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let mut config = valid_config();
        config.database.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.database);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
