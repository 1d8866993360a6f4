//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target database configuration.
    pub database: DatabaseConfig,

    /// Script repository and reconciliation behavior.
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Executed-script registry storage.
    #[serde(default)]
    pub executed_scripts: ExecutedScriptsConfig,

    /// Objects that clear and clean must leave alone.
    #[serde(default)]
    pub preserve: PreserveConfig,
}

impl Config {
    /// Schema used for unqualified names: the first configured schema.
    pub fn default_schema(&self) -> &str {
        self.database
            .schemas
            .first()
            .map(String::as_str)
            .unwrap_or("public")
    }
}

/// Target database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Logical database name matched against `@name` script prefixes.
    #[serde(default = "default_database_name")]
    pub name: String,

    /// Dialect key: postgres, oracle, mssql, mysql, db2, hsqldb, h2, derby.
    #[serde(default = "default_postgres")]
    pub dialect: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Physical database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Schemas under maintenance; the first one is the default schema.
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,

    /// Maximum pooled connections (default: 2, registry plus runner).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("dialect", &self.dialect)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schemas", &self.schemas)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// How statements reach the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    /// Execute parsed statements over the connection pool.
    #[default]
    Direct,
    /// Pipe whole scripts into a vendor command line client.
    Cli,
}

/// What to do with a successful incremental script whose content changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifiedScriptPolicy {
    /// Plan an ERROR entry.
    #[default]
    Error,
    /// Plan a logged re-execution.
    Reexecute,
}

/// Script repository configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Directories scanned for scripts.
    #[serde(default = "default_locations")]
    pub locations: Vec<PathBuf>,

    /// File extensions treated as scripts (without the dot).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory name holding post-processing scripts.
    #[serde(default = "default_postprocessing_dir")]
    pub postprocessing_dir: String,

    /// Prefix marking a qualifier token in a file name.
    #[serde(default = "default_qualifier_prefix")]
    pub qualifier_prefix: String,

    /// Prefix marking the target database token in a file name.
    #[serde(default = "default_target_database_prefix")]
    pub target_database_prefix: String,

    /// Registered qualifier vocabulary.
    #[serde(default)]
    pub qualifiers: Vec<String>,

    /// Qualifiers marking patch scripts.
    #[serde(default = "default_patch_qualifiers")]
    pub patch_qualifiers: Vec<String>,

    /// Only scripts carrying one of these qualifiers run (empty: all).
    #[serde(default)]
    pub include_qualifiers: Vec<String>,

    /// Scripts carrying one of these qualifiers never run.
    #[serde(default)]
    pub exclude_qualifiers: Vec<String>,

    /// Version below which incremental scripts are not reconciled, e.g. "1.5".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_revision: Option<String>,

    /// Let patch scripts run after higher indexes already executed.
    #[serde(default)]
    pub allow_out_of_sequence_patches: bool,

    /// Policy for modified, previously successful incremental scripts.
    #[serde(default)]
    pub modified_scripts: ModifiedScriptPolicy,

    /// Clear the database and start over when history conflicts are found.
    #[serde(default)]
    pub from_scratch: bool,

    /// Statement runner.
    #[serde(default)]
    pub runner: RunnerKind,

    /// Vendor CLI command line for the `cli` runner; the script is piped to stdin.
    #[serde(default = "default_cli_command")]
    pub cli_command: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            extensions: default_extensions(),
            postprocessing_dir: default_postprocessing_dir(),
            qualifier_prefix: default_qualifier_prefix(),
            target_database_prefix: default_target_database_prefix(),
            qualifiers: Vec::new(),
            patch_qualifiers: default_patch_qualifiers(),
            include_qualifiers: Vec::new(),
            exclude_qualifiers: Vec::new(),
            baseline_revision: None,
            allow_out_of_sequence_patches: false,
            modified_scripts: ModifiedScriptPolicy::default(),
            from_scratch: false,
            runner: RunnerKind::default(),
            cli_command: default_cli_command(),
        }
    }
}

/// Executed-script registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedScriptsConfig {
    /// Registry table name.
    #[serde(default = "default_registry_table")]
    pub table: String,

    /// Registry schema; defaults to the first configured schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Create the registry table when it does not exist.
    #[serde(default = "default_true")]
    pub auto_create: bool,
}

impl Default for ExecutedScriptsConfig {
    fn default() -> Self {
        Self {
            table: default_registry_table(),
            schema: None,
            auto_create: true,
        }
    }
}

/// Preserve-list configuration. Entries are `name` or `schema.name`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreserveConfig {
    #[serde(default)]
    pub schemas: Vec<String>,
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub views: Vec<String>,
    #[serde(default)]
    pub materialized_views: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub sequences: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    /// Schemas whose table rows the cleaner must keep.
    #[serde(default)]
    pub data_only_schemas: Vec<String>,
    /// Tables whose rows the cleaner must keep.
    #[serde(default)]
    pub data_only_tables: Vec<String>,
}

fn default_database_name() -> String {
    "default".to_string()
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_schemas() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_max_connections() -> usize {
    2
}

fn default_locations() -> Vec<PathBuf> {
    vec![PathBuf::from("scripts")]
}

fn default_extensions() -> Vec<String> {
    vec!["sql".to_string(), "ddl".to_string()]
}

fn default_postprocessing_dir() -> String {
    "postprocessing".to_string()
}

fn default_qualifier_prefix() -> String {
    "#".to_string()
}

fn default_target_database_prefix() -> String {
    "@".to_string()
}

fn default_patch_qualifiers() -> Vec<String> {
    vec!["patch".to_string()]
}

fn default_cli_command() -> Vec<String> {
    vec![
        "psql".to_string(),
        "-v".to_string(),
        "ON_ERROR_STOP=1".to_string(),
        "-f".to_string(),
        "-".to_string(),
    ]
}

fn default_registry_table() -> String {
    "dbmaintain_scripts".to_string()
}

fn default_true() -> bool {
    true
}
