//! PostgreSQL-backed executed-script registry.
//!
//! Records live in a single table (default `dbmaintain_scripts` in the first
//! configured schema). Each trait call runs as its own statement on a pooled
//! connection, so a record registered before a failed script stays visible as
//! unsuccessful.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Client, Pool};
use tokio_postgres::Row;
use tracing::{debug, info};

use super::backend::ExecutedScriptInfoSource;
use super::ExecutedScript;
use crate::core::identifier::quote_pg;
use crate::core::qualifier::{join, split};
use crate::core::{DbItemIdentifier, DbItemType, ScriptIndexes};
use crate::error::{MaintainError, Result};

const COLUMNS: &str = "file_name, version, qualifiers, target_database, description, checksum, executed_at, succeeded";

/// Registry stored in a PostgreSQL table.
pub struct PostgresExecutedScriptInfoSource {
    pool: Pool,
    schema: String,
    table: String,
    auto_create: bool,
}

impl PostgresExecutedScriptInfoSource {
    pub fn new(
        pool: Pool,
        schema: impl Into<String>,
        table: impl Into<String>,
        auto_create: bool,
    ) -> Self {
        Self {
            pool,
            schema: schema.into(),
            table: table.into(),
            auto_create,
        }
    }

    fn qualified_table(&self) -> Result<String> {
        Ok(format!("{}.{}", quote_pg(&self.schema)?, quote_pg(&self.table)?))
    }

    async fn client(&self) -> Result<Client> {
        self.pool
            .get()
            .await
            .map_err(|e| MaintainError::pool(e.to_string(), "executed-script registry"))
    }

    fn from_row(row: &Row) -> Result<ExecutedScript> {
        let version: String = row.get(1);
        let qualifiers: String = row.get(2);
        let executed_at: DateTime<Utc> = row.get(6);
        Ok(ExecutedScript {
            file_name: row.get(0),
            indexes: version.parse::<ScriptIndexes>()?,
            qualifiers: split(&qualifiers),
            target_database: row.get(3),
            description: row.get(4),
            checksum: row.get(5),
            executed_at,
            succeeded: row.get(7),
        })
    }

    async fn table_exists(&self, client: &Client) -> Result<bool> {
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM information_schema.tables
                                WHERE table_schema = $1 AND table_name = $2)",
                &[&self.schema, &self.table],
            )
            .await?;
        Ok(row.get(0))
    }
}

#[async_trait]
impl ExecutedScriptInfoSource for PostgresExecutedScriptInfoSource {
    async fn init_schema(&self) -> Result<()> {
        let client = self.client().await?;
        if self.table_exists(&client).await? {
            return Ok(());
        }
        if !self.auto_create {
            return Err(MaintainError::Config(format!(
                "Executed scripts table {}.{} does not exist and auto_create is disabled",
                self.schema, self.table
            )));
        }

        client
            .execute(
                &format!("CREATE SCHEMA IF NOT EXISTS {}", quote_pg(&self.schema)?),
                &[],
            )
            .await?;
        client
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id BIGSERIAL PRIMARY KEY,
                        script_key TEXT NOT NULL UNIQUE,
                        file_name TEXT NOT NULL,
                        version TEXT NOT NULL,
                        qualifiers TEXT NOT NULL DEFAULT '',
                        target_database TEXT,
                        description TEXT NOT NULL DEFAULT '',
                        checksum TEXT NOT NULL,
                        executed_at TIMESTAMPTZ NOT NULL,
                        succeeded BOOLEAN NOT NULL
                    )",
                    self.qualified_table()?
                ),
                &[],
            )
            .await?;

        info!("Created executed scripts table {}.{}", self.schema, self.table);
        Ok(())
    }

    async fn register_executed_script(&self, script: &ExecutedScript) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                &format!(
                    "INSERT INTO {} (script_key, {})
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                     ON CONFLICT (script_key) DO UPDATE SET
                        checksum = EXCLUDED.checksum,
                        description = EXCLUDED.description,
                        executed_at = EXCLUDED.executed_at,
                        succeeded = EXCLUDED.succeeded",
                    self.qualified_table()?,
                    COLUMNS
                ),
                &[
                    &script.identity(),
                    &script.file_name,
                    &script.indexes.to_string(),
                    &join(&script.qualifiers),
                    &script.target_database,
                    &script.description,
                    &script.checksum,
                    &script.executed_at,
                    &script.succeeded,
                ],
            )
            .await?;
        debug!("Registered {} (succeeded = {})", script.file_name, script.succeeded);
        Ok(())
    }

    async fn update_executed_script(&self, script: &ExecutedScript) -> Result<()> {
        let client = self.client().await?;
        let updated = client
            .execute(
                &format!(
                    "UPDATE {} SET checksum = $2, executed_at = $3, succeeded = $4
                     WHERE script_key = $1",
                    self.qualified_table()?
                ),
                &[
                    &script.identity(),
                    &script.checksum,
                    &script.executed_at,
                    &script.succeeded,
                ],
            )
            .await?;
        if updated == 0 {
            return Err(MaintainError::Config(format!(
                "Cannot update unregistered script {}",
                script.file_name
            )));
        }
        Ok(())
    }

    async fn get_executed_scripts(&self) -> Result<Vec<ExecutedScript>> {
        let client = self.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM {} ORDER BY id",
                    COLUMNS,
                    self.qualified_table()?
                ),
                &[],
            )
            .await?;
        rows.iter().map(Self::from_row).collect()
    }

    async fn delete_executed_script(&self, script: &ExecutedScript) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(
                &format!("DELETE FROM {} WHERE script_key = $1", self.qualified_table()?),
                &[&script.identity()],
            )
            .await?;
        Ok(())
    }

    async fn clear_all_executed_scripts(&self) -> Result<()> {
        let client = self.client().await?;
        client
            .execute(&format!("DELETE FROM {}", self.qualified_table()?), &[])
            .await?;
        Ok(())
    }

    async fn mark_failed_scripts_as_successful(&self) -> Result<usize> {
        let client = self.client().await?;
        let count = client
            .execute(
                &format!(
                    "UPDATE {} SET succeeded = TRUE WHERE succeeded = FALSE",
                    self.qualified_table()?
                ),
                &[],
            )
            .await?;
        Ok(count as usize)
    }

    async fn remove_failed_scripts(&self) -> Result<usize> {
        let client = self.client().await?;
        let count = client
            .execute(
                &format!("DELETE FROM {} WHERE succeeded = FALSE", self.qualified_table()?),
                &[],
            )
            .await?;
        Ok(count as usize)
    }

    fn registry_object(&self) -> DbItemIdentifier {
        DbItemIdentifier::new(DbItemType::Table, self.schema.clone(), self.table.clone())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}
