//! Dialect catalog for explicit dependency injection.
//!
//! The [`DialectCatalog`] maps a configuration key to a [`ScriptDialect`]
//! record. It is constructed explicitly and handed to the maintainer rather
//! than living in a global, so tests can register their own dialects.

use std::collections::HashMap;

use crate::dialect::ScriptDialect;
use crate::error::{MaintainError, Result};

/// Registry of script dialects by configuration key.
///
/// # Example
///
/// ```rust
/// use dbmaintain::core::DialectCatalog;
///
/// let catalog = DialectCatalog::with_builtins();
/// let dialect = catalog.require("oracle").unwrap();
/// assert!(dialect.starts_block("BEGIN NULL"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct DialectCatalog {
    dialects: HashMap<String, ScriptDialect>,
}

impl DialectCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog with the built-in dialects registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();

        catalog.register_dialect("postgres", ScriptDialect::postgres());
        catalog.register_dialect("oracle", ScriptDialect::oracle());
        catalog.register_dialect("mssql", ScriptDialect::mssql());
        catalog.register_dialect("mysql", ScriptDialect::mysql());
        catalog.register_dialect("db2", ScriptDialect::db2());

        // No procedural blocks in scripts for these.
        for name in ["hsqldb", "h2", "derby"] {
            catalog.register_dialect(name, ScriptDialect::plain(name));
        }

        catalog
    }

    /// Register a dialect by key. Keys are case-insensitive.
    pub fn register_dialect(&mut self, name: impl Into<String>, dialect: ScriptDialect) {
        self.dialects.insert(name.into().to_lowercase(), dialect);
    }

    /// Get a dialect by key, accepting the usual aliases.
    pub fn get(&self, name: &str) -> Option<&ScriptDialect> {
        self.dialects.get(&Self::normalize_key(name))
    }

    /// Get a dialect by key, returning an error if not found.
    pub fn require(&self, name: &str) -> Result<&ScriptDialect> {
        self.get(name).ok_or_else(|| {
            MaintainError::Config(format!(
                "Unknown database dialect: '{}'. Supported dialects: {}",
                name,
                self.dialect_names().join(", ")
            ))
        })
    }

    /// Check if a dialect is registered.
    pub fn has_dialect(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All registered keys, sorted.
    pub fn dialect_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.dialects.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn normalize_key(name: &str) -> String {
        match name.trim().to_lowercase().as_str() {
            "postgresql" | "pg" => "postgres".to_string(),
            "sqlserver" | "sql_server" => "mssql".to_string(),
            "mariadb" => "mysql".to_string(),
            other => other.to_string(),
        }
    }
}
