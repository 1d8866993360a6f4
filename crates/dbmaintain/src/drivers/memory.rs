//! In-memory database.
//!
//! Implements the catalog, constraint disabler and runner over a small object
//! model so the engine can be exercised without a server. Statements are
//! recorded; `CREATE TABLE|VIEW|SEQUENCE` and `INSERT INTO` are also applied to
//! the object model.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{LazyLock, Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;

use crate::core::{DbItemIdentifier, DbItemType};
use crate::drivers::{DatabaseCatalog, ScriptRunner, StatementOutcome};
use crate::error::{MaintainError, Result};
use crate::reset::ConstraintsDisabler;

static CREATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*create\s+(table|view|sequence)\s+(?:if\s+not\s+exists\s+)?([\w.]+)")
        .unwrap_or_else(|e| panic!("invalid create pattern: {e}"))
});

static INSERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*insert\s+into\s+([\w.]+)")
        .unwrap_or_else(|e| panic!("invalid insert pattern: {e}"))
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct ForeignKey {
    schema: String,
    table: String,
    references: String,
}

#[derive(Debug, Default)]
struct State {
    items: BTreeSet<DbItemIdentifier>,
    rows: BTreeMap<(String, String), usize>,
    foreign_keys: Vec<ForeignKey>,
    value_constraints: BTreeMap<String, usize>,
    executed: Vec<String>,
    fail_on: Option<String>,
}

/// Thread-safe in-memory database.
pub struct InMemoryDatabase {
    default_schema: String,
    state: Mutex<State>,
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new("public")
    }
}

impl InMemoryDatabase {
    pub fn new(default_schema: impl Into<String>) -> Self {
        Self {
            default_schema: default_schema.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| MaintainError::Io(std::io::Error::other("in-memory database lock poisoned")))
    }

    pub fn add_item(&self, item: DbItemIdentifier) -> Result<()> {
        self.state()?.items.insert(item);
        Ok(())
    }

    pub fn add_table(&self, schema: &str, name: &str, rows: usize) -> Result<()> {
        let mut state = self.state()?;
        state
            .items
            .insert(DbItemIdentifier::new(DbItemType::Table, schema, name));
        state.rows.insert((schema.to_string(), name.to_string()), rows);
        Ok(())
    }

    /// Foreign key from `table` to `references`, both in `schema`.
    pub fn add_foreign_key(&self, schema: &str, table: &str, references: &str) -> Result<()> {
        self.state()?.foreign_keys.push(ForeignKey {
            schema: schema.to_string(),
            table: table.to_string(),
            references: references.to_string(),
        });
        Ok(())
    }

    pub fn add_value_constraints(&self, schema: &str, count: usize) -> Result<()> {
        *self
            .state()?
            .value_constraints
            .entry(schema.to_string())
            .or_default() += count;
        Ok(())
    }

    /// Fail every statement containing `needle`.
    pub fn fail_on(&self, needle: impl Into<String>) -> Result<()> {
        self.state()?.fail_on = Some(needle.into());
        Ok(())
    }

    pub fn items(&self) -> Result<Vec<DbItemIdentifier>> {
        Ok(self.state()?.items.iter().cloned().collect())
    }

    pub fn contains(&self, item: &DbItemIdentifier) -> Result<bool> {
        Ok(self.state()?.items.contains(item))
    }

    pub fn row_count(&self, schema: &str, table: &str) -> Result<Option<usize>> {
        Ok(self
            .state()?
            .rows
            .get(&(schema.to_string(), table.to_string()))
            .copied())
    }

    pub fn foreign_key_count(&self) -> Result<usize> {
        Ok(self.state()?.foreign_keys.len())
    }

    /// Statements executed so far, in order.
    pub fn executed_statements(&self) -> Result<Vec<String>> {
        Ok(self.state()?.executed.clone())
    }

    fn split_name<'n>(&'n self, name: &'n str) -> (&'n str, &'n str) {
        match name.split_once('.') {
            Some((schema, name)) => (schema, name),
            None => (self.default_schema.as_str(), name),
        }
    }

    fn apply(&self, state: &mut State, statement: &str) {
        if let Some(caps) = CREATE.captures(statement) {
            let item_type = match caps[1].to_ascii_lowercase().as_str() {
                "table" => DbItemType::Table,
                "view" => DbItemType::View,
                _ => DbItemType::Sequence,
            };
            let (schema, name) = self.split_name(&caps[2]);
            let (schema, name) = (schema.to_ascii_lowercase(), name.to_ascii_lowercase());
            if item_type == DbItemType::Table {
                state.rows.insert((schema.clone(), name.clone()), 0);
            }
            state
                .items
                .insert(DbItemIdentifier::new(item_type, schema, name));
        } else if let Some(caps) = INSERT.captures(statement) {
            let (schema, name) = self.split_name(&caps[1]);
            let key = (schema.to_ascii_lowercase(), name.to_ascii_lowercase());
            if let Some(rows) = state.rows.get_mut(&key) {
                *rows += 1;
            }
        }
    }
}

#[async_trait]
impl DatabaseCatalog for InMemoryDatabase {
    async fn list_items(
        &self,
        schema: &str,
        item_type: DbItemType,
    ) -> Result<Vec<DbItemIdentifier>> {
        Ok(self
            .state()?
            .items
            .iter()
            .filter(|i| i.item_type == item_type && i.schema == schema)
            .cloned()
            .collect())
    }

    async fn drop_item(&self, item: &DbItemIdentifier) -> Result<()> {
        let mut state = self.state()?;
        if item.item_type == DbItemType::Table {
            if let Some(fk) = state.foreign_keys.iter().find(|fk| {
                fk.schema == item.schema && fk.references == item.name && fk.table != item.name
            }) {
                return Err(MaintainError::dependency_violation(
                    item.to_string(),
                    format!("referenced by a foreign key on {}.{}", fk.schema, fk.table),
                ));
            }
            state
                .foreign_keys
                .retain(|fk| !(fk.schema == item.schema && fk.table == item.name));
            state.rows.remove(&(item.schema.clone(), item.name.clone()));
        }
        state.items.remove(item);
        Ok(())
    }

    async fn delete_rows(&self, table: &DbItemIdentifier) -> Result<()> {
        let mut state = self.state()?;
        let referencing = state.foreign_keys.iter().find(|fk| {
            fk.schema == table.schema
                && fk.references == table.name
                && fk.table != table.name
                && state
                    .rows
                    .get(&(fk.schema.clone(), fk.table.clone()))
                    .is_some_and(|rows| *rows > 0)
        });
        if let Some(fk) = referencing {
            return Err(MaintainError::dependency_violation(
                table.to_string(),
                format!("rows referenced from {}.{}", fk.schema, fk.table),
            ));
        }
        if let Some(rows) = state
            .rows
            .get_mut(&(table.schema.clone(), table.name.clone()))
        {
            *rows = 0;
        }
        Ok(())
    }

    fn catalog_type(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl ConstraintsDisabler for InMemoryDatabase {
    async fn disable_referential_constraints(&self, schema: &str) -> Result<usize> {
        let mut state = self.state()?;
        let before = state.foreign_keys.len();
        state.foreign_keys.retain(|fk| fk.schema != schema);
        Ok(before - state.foreign_keys.len())
    }

    async fn disable_value_constraints(&self, schema: &str) -> Result<usize> {
        Ok(self
            .state()?
            .value_constraints
            .remove(schema)
            .unwrap_or(0))
    }
}

#[async_trait]
impl ScriptRunner for InMemoryDatabase {
    async fn execute_statement(&self, statement: &str) -> Result<StatementOutcome> {
        let mut state = self.state()?;
        if let Some(needle) = &state.fail_on {
            if statement.contains(needle.as_str()) {
                return Ok(StatementOutcome::failed(
                    statement,
                    format!("statement rejected: contains '{}'", needle),
                ));
            }
        }
        state.executed.push(statement.to_string());
        self.apply(&mut state, statement);
        Ok(StatementOutcome::succeeded(statement))
    }

    fn runner_type(&self) -> &'static str {
        "memory"
    }
}
