//! Direct statement execution over the pool.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tracing::debug;

use super::describe;
use crate::drivers::{ScriptRunner, StatementOutcome};
use crate::error::{MaintainError, Result};

/// Runs statements one at a time with the simple query protocol.
///
/// Statements run in autocommit mode, so a failure leaves the effects of
/// earlier statements in place.
pub struct PostgresScriptRunner {
    pool: Pool,
}

impl PostgresScriptRunner {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScriptRunner for PostgresScriptRunner {
    async fn execute_statement(&self, statement: &str) -> Result<StatementOutcome> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MaintainError::pool(e.to_string(), "executing statement"))?;

        debug!("Executing: {}", statement);
        match client.batch_execute(statement).await {
            Ok(()) => Ok(StatementOutcome::succeeded(statement)),
            Err(e) if e.as_db_error().is_some() => {
                Ok(StatementOutcome::failed(statement, describe(&e)))
            }
            Err(e) => Err(MaintainError::Database(e)),
        }
    }

    fn runner_type(&self) -> &'static str {
        "postgres"
    }
}
