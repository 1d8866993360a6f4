use tracing::{debug, info};

use crate::core::{DbItemIdentifier, DbItemType, PreserveSet};
use crate::drivers::DatabaseCatalog;
use crate::error::Result;

/// Drops every structural object of a schema that is not preserved.
pub struct DbClearer<'a> {
    catalog: &'a dyn DatabaseCatalog,
    preserve: &'a PreserveSet,
}

impl<'a> DbClearer<'a> {
    pub fn new(catalog: &'a dyn DatabaseCatalog, preserve: &'a PreserveSet) -> Self {
        Self { catalog, preserve }
    }

    /// Clear one schema and return the dropped objects.
    ///
    /// Object kinds are visited in [`DbItemType::DROP_ORDER`]. Each kind is
    /// listed just before it is dropped, so objects removed together with an
    /// earlier one (owned sequences, table triggers) are not visited twice.
    pub async fn clear_schema(&self, schema: &str) -> Result<Vec<DbItemIdentifier>> {
        if self.preserve.is_schema_preserved(schema) {
            info!("Schema {} is preserved, not clearing", schema);
            return Ok(Vec::new());
        }

        let mut dropped = Vec::new();
        for item_type in DbItemType::DROP_ORDER {
            for item in self.catalog.list_items(schema, item_type).await? {
                if self.preserve.contains(&item) {
                    debug!("Preserving {}", item);
                    continue;
                }
                self.catalog.drop_item(&item).await?;
                debug!("Dropped {}", item);
                dropped.push(item);
            }
        }

        info!("Cleared schema {}: dropped {} object(s)", schema, dropped.len());
        Ok(dropped)
    }
}
