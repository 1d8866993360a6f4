//! Database boundary implementations.
//!
//! This module defines the boundary traits the engine calls into and provides
//! their implementations:
//!
//! - [`postgres`]: pooled PostgreSQL connectivity, catalog access, constraint
//!   disabling and direct statement execution
//! - [`cli`]: script execution through a vendor command line client
//! - [`memory`]: an in-memory database for tests and embedders
//!
//! # Adding New Databases
//!
//! 1. Register a [`ScriptDialect`](crate::dialect::ScriptDialect) in
//!    `DialectCatalog::with_builtins()`
//! 2. Implement [`ScriptRunner`] (or use [`CliScriptRunner`] with the vendor client)
//! 3. Implement [`DatabaseCatalog`] and
//!    [`ConstraintsDisabler`](crate::reset::ConstraintsDisabler) for clear and clean

pub mod cli;
pub mod memory;
pub mod postgres;

pub use cli::CliScriptRunner;
pub use memory::InMemoryDatabase;
pub use postgres::{PostgresCatalog, PostgresScriptRunner};

use async_trait::async_trait;
use serde::Serialize;

use crate::core::{DbItemIdentifier, DbItemType, Script};
use crate::error::Result;

/// Live object enumeration and removal.
#[async_trait]
pub trait DatabaseCatalog: Send + Sync {
    /// Existing objects of `item_type` in `schema`, named as the catalog stores them.
    async fn list_items(&self, schema: &str, item_type: DbItemType)
        -> Result<Vec<DbItemIdentifier>>;

    /// Drop one object. Blocked drops surface as `DependencyViolation`.
    async fn drop_item(&self, item: &DbItemIdentifier) -> Result<()>;

    /// Delete every row of a table, keeping its structure.
    async fn delete_rows(&self, table: &DbItemIdentifier) -> Result<()>;

    fn catalog_type(&self) -> &'static str;
}

/// Result of one statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementOutcome {
    pub statement: String,
    /// Database message when the statement failed.
    pub error: Option<String>,
}

impl StatementOutcome {
    pub fn succeeded(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            error: None,
        }
    }

    pub fn failed(statement: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Executes statements against the target database.
///
/// Failures of individual statements are reported as outcomes; `Err` is kept
/// for infrastructure problems such as an unreachable database.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Execute one statement.
    async fn execute_statement(&self, statement: &str) -> Result<StatementOutcome>;

    /// Execute statements in order, stopping after the first failure.
    async fn execute_statements(&self, statements: &[String]) -> Result<Vec<StatementOutcome>> {
        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            let outcome = self.execute_statement(statement).await?;
            let failed = !outcome.is_success();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Run a whole script given its parsed statements.
    async fn run_script(
        &self,
        _script: &Script,
        statements: &[String],
    ) -> Result<Vec<StatementOutcome>> {
        self.execute_statements(statements).await
    }

    fn runner_type(&self) -> &'static str;
}
