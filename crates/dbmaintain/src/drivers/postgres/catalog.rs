//! PostgreSQL catalog access.
//!
//! Objects are enumerated from `pg_catalog`. Extension-owned objects, internal
//! triggers and partitions (dropped with their parent) are left out. Synonyms
//! do not exist in PostgreSQL and always list empty.

use async_trait::async_trait;
use deadpool_postgres::{Client, Pool};
use tracing::{debug, info};

use super::{describe, is_dependency_violation};
use crate::core::identifier::{qualify_pg, quote_pg};
use crate::core::{DbItemIdentifier, DbItemType};
use crate::drivers::DatabaseCatalog;
use crate::error::{MaintainError, Result};
use crate::reset::ConstraintsDisabler;

const NOT_EXTENSION_OWNED: &str =
    "NOT EXISTS (SELECT 1 FROM pg_depend d WHERE d.objid = c.oid AND d.deptype = 'e')";

/// Catalog and constraint access for one PostgreSQL database.
pub struct PostgresCatalog {
    pool: Pool,
    /// Never altered by the constraint disabler.
    registry: DbItemIdentifier,
}

impl PostgresCatalog {
    pub fn new(pool: Pool, registry: DbItemIdentifier) -> Self {
        Self { pool, registry }
    }

    async fn client(&self) -> Result<Client> {
        self.pool
            .get()
            .await
            .map_err(|e| MaintainError::pool(e.to_string(), "catalog access"))
    }

    async fn relations(&self, schema: &str, relkinds: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT c.relname
                     FROM pg_class c
                     JOIN pg_namespace n ON n.oid = c.relnamespace
                     WHERE n.nspname = $1
                       AND c.relkind = ANY(ARRAY[{}]::\"char\"[])
                       AND NOT c.relispartition
                       AND {}
                     ORDER BY c.relname",
                    relkinds, NOT_EXTENSION_OWNED
                ),
                &[&schema],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn triggers(&self, schema: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT DISTINCT t.tgname
                 FROM pg_trigger t
                 JOIN pg_class c ON c.oid = t.tgrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE n.nspname = $1 AND NOT t.tgisinternal
                 ORDER BY t.tgname",
                &[&schema],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn types(&self, schema: &str) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT t.typname
                 FROM pg_type t
                 JOIN pg_namespace n ON n.oid = t.typnamespace
                 WHERE n.nspname = $1
                   AND t.typtype IN ('c', 'e', 'r')
                   AND (t.typrelid = 0
                        OR (SELECT c.relkind FROM pg_class c WHERE c.oid = t.typrelid) = 'c')
                   AND NOT EXISTS (SELECT 1 FROM pg_depend d
                                   WHERE d.objid = t.oid AND d.deptype = 'e')
                 ORDER BY t.typname",
                &[&schema],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }

    async fn drop_trigger(&self, client: &Client, item: &DbItemIdentifier) -> Result<()> {
        let rows = client
            .query(
                "SELECT c.relname
                 FROM pg_trigger t
                 JOIN pg_class c ON c.oid = t.tgrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE n.nspname = $1 AND t.tgname = $2 AND NOT t.tgisinternal",
                &[&item.schema, &item.name],
            )
            .await?;
        for row in rows {
            let table: String = row.get(0);
            let sql = format!(
                "DROP TRIGGER IF EXISTS {} ON {}",
                quote_pg(&item.name)?,
                qualify_pg(&item.schema, &table)?
            );
            self.run_ddl(client, item, &sql).await?;
        }
        Ok(())
    }

    async fn run_ddl(&self, client: &Client, item: &DbItemIdentifier, sql: &str) -> Result<()> {
        debug!("{}", sql);
        client.batch_execute(sql).await.map_err(|e| {
            if is_dependency_violation(&e) {
                MaintainError::dependency_violation(item.to_string(), describe(&e))
            } else {
                MaintainError::Database(e)
            }
        })
    }

    fn is_registry(&self, schema: &str, table: &str) -> bool {
        self.registry.schema == schema && self.registry.name == table
    }
}

#[async_trait]
impl DatabaseCatalog for PostgresCatalog {
    async fn list_items(
        &self,
        schema: &str,
        item_type: DbItemType,
    ) -> Result<Vec<DbItemIdentifier>> {
        let names = match item_type {
            DbItemType::Table => self.relations(schema, "'r', 'p'").await?,
            DbItemType::View => self.relations(schema, "'v'").await?,
            DbItemType::MaterializedView => self.relations(schema, "'m'").await?,
            DbItemType::Sequence => self.relations(schema, "'S'").await?,
            DbItemType::Trigger => self.triggers(schema).await?,
            DbItemType::Type => self.types(schema).await?,
            DbItemType::Synonym => Vec::new(),
        };
        Ok(names
            .into_iter()
            .map(|name| DbItemIdentifier::new(item_type, schema, name))
            .collect())
    }

    async fn drop_item(&self, item: &DbItemIdentifier) -> Result<()> {
        let client = self.client().await?;
        match item.item_type {
            DbItemType::Synonym => Ok(()),
            DbItemType::Trigger => self.drop_trigger(&client, item).await,
            other => {
                let sql = format!("DROP {} IF EXISTS {}", other.keyword(), item.qualified_pg()?);
                self.run_ddl(&client, item, &sql).await
            }
        }
    }

    async fn delete_rows(&self, table: &DbItemIdentifier) -> Result<()> {
        let client = self.client().await?;
        let sql = format!("DELETE FROM {}", table.qualified_pg()?);
        self.run_ddl(&client, table, &sql).await
    }

    fn catalog_type(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl ConstraintsDisabler for PostgresCatalog {
    async fn disable_referential_constraints(&self, schema: &str) -> Result<usize> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT cl.relname, con.conname
                 FROM pg_constraint con
                 JOIN pg_class cl ON cl.oid = con.conrelid
                 JOIN pg_namespace n ON n.oid = cl.relnamespace
                 WHERE con.contype = 'f' AND n.nspname = $1",
                &[&schema],
            )
            .await?;

        let mut count = 0;
        for row in rows {
            let table: String = row.get(0);
            let constraint: String = row.get(1);
            if self.is_registry(schema, &table) {
                continue;
            }
            client
                .batch_execute(&format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                    qualify_pg(schema, &table)?,
                    quote_pg(&constraint)?
                ))
                .await?;
            count += 1;
        }
        info!("Disabled {} foreign key constraint(s) in schema {}", count, schema);
        Ok(count)
    }

    async fn disable_value_constraints(&self, schema: &str) -> Result<usize> {
        let client = self.client().await?;
        let checks = client
            .query(
                "SELECT cl.relname, con.conname
                 FROM pg_constraint con
                 JOIN pg_class cl ON cl.oid = con.conrelid
                 JOIN pg_namespace n ON n.oid = cl.relnamespace
                 WHERE con.contype = 'c' AND n.nspname = $1 AND cl.relkind IN ('r', 'p')",
                &[&schema],
            )
            .await?;
        let not_nulls = client
            .query(
                "SELECT c.relname, a.attname
                 FROM pg_attribute a
                 JOIN pg_class c ON c.oid = a.attrelid
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE n.nspname = $1
                   AND c.relkind IN ('r', 'p')
                   AND NOT c.relispartition
                   AND a.attnum > 0 AND NOT a.attisdropped AND a.attnotnull
                   AND NOT EXISTS (SELECT 1 FROM pg_index i
                                   WHERE i.indrelid = c.oid AND i.indisprimary
                                     AND a.attnum = ANY(i.indkey))",
                &[&schema],
            )
            .await?;

        let mut count = 0;
        for row in checks {
            let table: String = row.get(0);
            let constraint: String = row.get(1);
            if self.is_registry(schema, &table) {
                continue;
            }
            client
                .batch_execute(&format!(
                    "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
                    qualify_pg(schema, &table)?,
                    quote_pg(&constraint)?
                ))
                .await?;
            count += 1;
        }
        for row in not_nulls {
            let table: String = row.get(0);
            let column: String = row.get(1);
            if self.is_registry(schema, &table) {
                continue;
            }
            client
                .batch_execute(&format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP NOT NULL",
                    qualify_pg(schema, &table)?,
                    quote_pg(&column)?
                ))
                .await?;
            count += 1;
        }
        info!("Disabled {} value constraint(s) in schema {}", count, schema);
        Ok(count)
    }
}
