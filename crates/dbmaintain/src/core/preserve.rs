//! Objects that destructive operations must leave alone.

use std::collections::HashSet;

use crate::config::PreserveConfig;
use crate::error::Result;

use super::identifier::{
    parse_qualified_name, parse_schema_name, DbItemIdentifier, DbItemType, IdentifierCase,
};

type ItemKey = (DbItemType, String, String);

/// Immutable preserve list for one run.
///
/// Membership compares comparison keys produced by the dialect's
/// [`IdentifierCase`], so entries written in configuration match what the live
/// catalog reports. The executed-script registry table is always a member.
#[derive(Debug, Clone)]
pub struct PreserveSet {
    case: IdentifierCase,
    schemas: HashSet<String>,
    items: HashSet<ItemKey>,
    data_only_schemas: HashSet<String>,
    data_only_tables: HashSet<(String, String)>,
    registry: DbItemIdentifier,
}

impl PreserveSet {
    /// A set holding only the registry object.
    pub fn new(case: IdentifierCase, registry: DbItemIdentifier) -> Self {
        Self {
            case,
            schemas: HashSet::new(),
            items: HashSet::new(),
            data_only_schemas: HashSet::new(),
            data_only_tables: HashSet::new(),
            registry,
        }
    }

    /// Build from configuration. Malformed entries are configuration errors.
    pub fn from_config(
        config: &PreserveConfig,
        default_schema: &str,
        case: IdentifierCase,
        registry: DbItemIdentifier,
    ) -> Result<Self> {
        let mut set = Self::new(case, registry);

        for schema in &config.schemas {
            set.preserve_schema(&parse_schema_name(schema, case)?);
        }
        for schema in &config.data_only_schemas {
            let schema = parse_schema_name(schema, case)?;
            set.data_only_schemas.insert(case.comparison_key(&schema));
        }

        let typed = [
            (DbItemType::Table, &config.tables),
            (DbItemType::View, &config.views),
            (DbItemType::MaterializedView, &config.materialized_views),
            (DbItemType::Synonym, &config.synonyms),
            (DbItemType::Sequence, &config.sequences),
            (DbItemType::Trigger, &config.triggers),
            (DbItemType::Type, &config.types),
        ];
        for (item_type, entries) in typed {
            for entry in entries {
                let (schema, name) = parse_qualified_name(entry, default_schema, case)?;
                set.preserve(&DbItemIdentifier::new(item_type, schema, name));
            }
        }

        for entry in &config.data_only_tables {
            let (schema, name) = parse_qualified_name(entry, default_schema, case)?;
            set.data_only_tables
                .insert((case.comparison_key(&schema), case.comparison_key(&name)));
        }

        Ok(set)
    }

    pub fn preserve_schema(&mut self, schema: &str) {
        self.schemas.insert(self.case.comparison_key(schema));
    }

    pub fn preserve(&mut self, item: &DbItemIdentifier) {
        let key = self.key(item);
        self.items.insert(key);
    }

    pub fn is_schema_preserved(&self, schema: &str) -> bool {
        self.schemas.contains(&self.case.comparison_key(schema))
    }

    fn is_registry(&self, item: &DbItemIdentifier) -> bool {
        self.key(item) == self.key(&self.registry)
    }

    /// True when the clearer must not drop `item`.
    pub fn contains(&self, item: &DbItemIdentifier) -> bool {
        self.is_registry(item)
            || self.is_schema_preserved(&item.schema)
            || self.items.contains(&self.key(item))
    }

    /// True when the cleaner must keep the rows of table `schema.table`.
    pub fn is_data_preserved(&self, schema: &str, table: &str) -> bool {
        let item = DbItemIdentifier::new(DbItemType::Table, schema, table);
        if self.contains(&item) {
            return true;
        }
        let schema_key = self.case.comparison_key(schema);
        self.data_only_schemas.contains(&schema_key)
            || self
                .data_only_tables
                .contains(&(schema_key, self.case.comparison_key(table)))
    }

    fn key(&self, item: &DbItemIdentifier) -> ItemKey {
        (
            item.item_type,
            self.case.comparison_key(&item.schema),
            self.case.comparison_key(&item.name),
        )
    }
}
