use tracing::{debug, info};

use crate::core::{DbItemIdentifier, DbItemType, PreserveSet};
use crate::drivers::DatabaseCatalog;
use crate::error::Result;

/// Deletes the rows of every table whose data is not preserved.
pub struct DbCleaner<'a> {
    catalog: &'a dyn DatabaseCatalog,
    preserve: &'a PreserveSet,
}

impl<'a> DbCleaner<'a> {
    pub fn new(catalog: &'a dyn DatabaseCatalog, preserve: &'a PreserveSet) -> Self {
        Self { catalog, preserve }
    }

    /// Clean one schema and return the emptied tables.
    pub async fn clean_schema(&self, schema: &str) -> Result<Vec<DbItemIdentifier>> {
        if self.preserve.is_schema_preserved(schema) {
            info!("Schema {} is preserved, not cleaning", schema);
            return Ok(Vec::new());
        }

        let mut cleaned = Vec::new();
        for table in self.catalog.list_items(schema, DbItemType::Table).await? {
            if self.preserve.is_data_preserved(&table.schema, &table.name) {
                debug!("Preserving data of {}", table);
                continue;
            }
            self.catalog.delete_rows(&table).await?;
            debug!("Deleted rows of {}", table);
            cleaned.push(table);
        }

        info!("Cleaned schema {}: emptied {} table(s)", schema, cleaned.len());
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreserveConfig;
    use crate::core::IdentifierCase;
    use crate::drivers::InMemoryDatabase;
    use crate::error::MaintainError;
    use crate::reset::ConstraintsDisabler;

    fn registry() -> DbItemIdentifier {
        DbItemIdentifier::new(DbItemType::Table, "public", "dbmaintain_scripts")
    }

    fn database() -> InMemoryDatabase {
        let db = InMemoryDatabase::default();
        for name in ["a", "b", "c", "dbmaintain_scripts"] {
            db.add_table("public", name, 5).unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_cleans_only_unpreserved_tables() {
        let db = database();
        let mut preserve = PreserveSet::new(IdentifierCase::Lower, registry());
        preserve.preserve(&DbItemIdentifier::new(DbItemType::Table, "public", "b"));

        let cleaned = DbCleaner::new(&db, &preserve)
            .clean_schema("public")
            .await
            .unwrap();

        let names: Vec<_> = cleaned.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(db.row_count("public", "a").unwrap(), Some(0));
        assert_eq!(db.row_count("public", "b").unwrap(), Some(5));
        assert_eq!(db.row_count("public", "c").unwrap(), Some(0));
        assert_eq!(db.row_count("public", "dbmaintain_scripts").unwrap(), Some(5));
        // structure stays
        assert_eq!(db.items().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_data_only_entries_keep_rows() {
        let db = database();
        let config = PreserveConfig {
            data_only_tables: vec!["A".to_string()],
            ..Default::default()
        };
        let preserve =
            PreserveSet::from_config(&config, "public", IdentifierCase::Lower, registry()).unwrap();

        DbCleaner::new(&db, &preserve)
            .clean_schema("public")
            .await
            .unwrap();
        assert_eq!(db.row_count("public", "a").unwrap(), Some(5));
        assert_eq!(db.row_count("public", "b").unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_referenced_rows_need_disabled_constraints() {
        let db = database();
        db.add_foreign_key("public", "c", "a").unwrap();
        let preserve = PreserveSet::new(IdentifierCase::Lower, registry());
        let cleaner = DbCleaner::new(&db, &preserve);

        let err = cleaner.clean_schema("public").await.unwrap_err();
        assert!(matches!(err, MaintainError::DependencyViolation { .. }));

        db.disable_referential_constraints("public").await.unwrap();
        assert_eq!(cleaner.clean_schema("public").await.unwrap().len(), 3);
    }
}
