//! Error types for the maintenance library.

use thiserror::Error;

/// Main error type for schema maintenance operations.
#[derive(Error, Debug)]
pub enum MaintainError {
    /// Configuration error (invalid YAML, unregistered qualifier, bad preserve entry, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A script could not be split into statements.
    #[error("Parse error in script {script} at line {line} (offset {offset}): unterminated {construct}")]
    Parse {
        script: String,
        line: usize,
        offset: usize,
        construct: String,
    },

    /// A script that already ran successfully has changed since.
    #[error("Script {script} has been modified since it was executed (recorded checksum {recorded}, current {current})")]
    ModifiedScript {
        script: String,
        recorded: String,
        current: String,
    },

    /// A lower-indexed script appeared after a higher index already ran.
    #[error("Script {script} has a lower index than already executed script {executed}")]
    OutOfOrder { script: String, executed: String },

    /// The registry shows an earlier attempt of this script that did not succeed.
    #[error("Script {0} failed during a previous update; fix it, then run remove-error-scripts or mark-error-scripts-successful")]
    PreviousFailure(String),

    /// The execution plan contains ERROR entries and force mode is off.
    #[error("Update aborted, {count} conflict(s) detected:\n{details}")]
    ConflictsDetected { count: usize, details: String },

    /// A statement failed against the live database.
    #[error("Execution of script {script} failed: {message}\n  Statement: {statement}")]
    Execution {
        script: String,
        statement: String,
        message: String,
    },

    /// Clear or clean was blocked by dependent objects or live foreign keys.
    #[error("Dependency violation while removing {item}: {message}")]
    DependencyViolation { item: String, message: String },

    /// Database error from the registry, catalog or runner.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// External script runner (vendor CLI) could not be started or failed.
    #[error("Script runner error: {0}")]
    Runner(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MaintainError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        MaintainError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create an Execution error
    pub fn execution(
        script: impl Into<String>,
        statement: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MaintainError::Execution {
            script: script.into(),
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// Create a DependencyViolation error
    pub fn dependency_violation(item: impl Into<String>, message: impl Into<String>) -> Self {
        MaintainError::DependencyViolation {
            item: item.into(),
            message: message.into(),
        }
    }

    /// True for the reconciliation conflict family.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            MaintainError::ModifiedScript { .. }
                | MaintainError::OutOfOrder { .. }
                | MaintainError::PreviousFailure(_)
                | MaintainError::ConflictsDetected { .. }
        )
    }

    /// Process exit code for this error family.
    pub fn exit_code(&self) -> u8 {
        match self {
            MaintainError::Config(_) | MaintainError::Yaml(_) => 2,
            MaintainError::Parse { .. } => 3,
            e if e.is_conflict() => 4,
            MaintainError::Execution { .. } | MaintainError::Runner(_) => 5,
            MaintainError::DependencyViolation { .. } => 6,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for maintenance operations.
pub type Result<T> = std::result::Result<T, MaintainError>;
