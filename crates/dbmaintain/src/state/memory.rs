//! In-memory registry, for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::backend::ExecutedScriptInfoSource;
use super::ExecutedScript;
use crate::core::{DbItemIdentifier, DbItemType};
use crate::error::{MaintainError, Result};

/// Registry kept in a map keyed by record identity.
pub struct InMemoryExecutedScriptInfoSource {
    records: Mutex<BTreeMap<String, ExecutedScript>>,
    registry_object: DbItemIdentifier,
}

impl InMemoryExecutedScriptInfoSource {
    pub fn new(registry_object: DbItemIdentifier) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            registry_object,
        }
    }

    /// Registry pre-populated with `records`.
    pub fn with_records(
        registry_object: DbItemIdentifier,
        records: impl IntoIterator<Item = ExecutedScript>,
    ) -> Self {
        let registry = Self::new(registry_object);
        if let Ok(mut map) = registry.records.lock() {
            for record in records {
                map.insert(record.identity(), record);
            }
        }
        registry
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<String, ExecutedScript>>> {
        self.records
            .lock()
            .map_err(|_| MaintainError::Io(std::io::Error::other("in-memory registry lock poisoned")))
    }
}

impl Default for InMemoryExecutedScriptInfoSource {
    fn default() -> Self {
        Self::new(DbItemIdentifier::new(
            DbItemType::Table,
            "public",
            "dbmaintain_scripts",
        ))
    }
}

#[async_trait]
impl ExecutedScriptInfoSource for InMemoryExecutedScriptInfoSource {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn register_executed_script(&self, script: &ExecutedScript) -> Result<()> {
        self.records()?.insert(script.identity(), script.clone());
        Ok(())
    }

    async fn update_executed_script(&self, script: &ExecutedScript) -> Result<()> {
        let mut records = self.records()?;
        match records.get_mut(&script.identity()) {
            Some(record) => {
                *record = script.clone();
                Ok(())
            }
            None => Err(MaintainError::Config(format!(
                "Cannot update unregistered script {}",
                script.file_name
            ))),
        }
    }

    async fn get_executed_scripts(&self) -> Result<Vec<ExecutedScript>> {
        Ok(self.records()?.values().cloned().collect())
    }

    async fn delete_executed_script(&self, script: &ExecutedScript) -> Result<()> {
        self.records()?.remove(&script.identity());
        Ok(())
    }

    async fn clear_all_executed_scripts(&self) -> Result<()> {
        self.records()?.clear();
        Ok(())
    }

    async fn mark_failed_scripts_as_successful(&self) -> Result<usize> {
        let mut records = self.records()?;
        let mut count = 0;
        for record in records.values_mut().filter(|r| !r.succeeded) {
            record.succeeded = true;
            count += 1;
        }
        Ok(count)
    }

    async fn remove_failed_scripts(&self) -> Result<usize> {
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|_, r| r.succeeded);
        Ok(before - records.len())
    }

    fn registry_object(&self) -> DbItemIdentifier {
        self.registry_object.clone()
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
