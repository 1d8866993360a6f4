//! Executed-script registry.
//!
//! The registry is the durable record of what has run against the target
//! database. A record is registered as not-yet-successful before its script
//! runs and updated afterwards, so an interrupted run leaves an honest
//! "not confirmed" record behind.

mod backend;
mod db;
mod memory;

pub use backend::ExecutedScriptInfoSource;
pub use db::PostgresExecutedScriptInfoSource;
pub use memory::InMemoryExecutedScriptInfoSource;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::qualifier::join;
use crate::core::{Qualifier, Script, ScriptIndexes, ScriptKey};

/// A script plus the outcome of its execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedScript {
    pub file_name: String,
    pub indexes: ScriptIndexes,
    pub qualifiers: BTreeSet<Qualifier>,
    pub target_database: Option<String>,
    pub description: String,
    /// Checksum of the content that was executed.
    pub checksum: String,
    pub executed_at: DateTime<Utc>,
    pub succeeded: bool,
}

impl ExecutedScript {
    /// Record for a script about to run; not successful until updated.
    pub fn pending(script: &Script) -> Self {
        Self {
            file_name: script.file_name.clone(),
            indexes: script.indexes.clone(),
            qualifiers: script.qualifiers.clone(),
            target_database: script.target_database.clone(),
            description: script.description.clone(),
            checksum: script.checksum.clone(),
            executed_at: Utc::now(),
            succeeded: false,
        }
    }

    /// Record for a script marked as run without executing it.
    pub fn succeeded(script: &Script) -> Self {
        Self {
            succeeded: true,
            ..Self::pending(script)
        }
    }

    /// Set the outcome and stamp the time.
    pub fn finish(&mut self, succeeded: bool) {
        self.succeeded = succeeded;
        self.executed_at = Utc::now();
    }

    pub fn key(&self) -> ScriptKey {
        ScriptKey {
            indexes: self.indexes.clone(),
            qualifiers: self.qualifiers.clone(),
            target_database: self.target_database.clone(),
            file_name: self.file_name.clone(),
        }
    }

    /// Stable text form of the identity, used as the registry's unique key.
    pub fn identity(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.indexes,
            join(&self.qualifiers),
            self.target_database.as_deref().unwrap_or(""),
            self.file_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScriptKind;

    fn script() -> Script {
        Script::new(
            "01_schema/02_#patch_orders.sql",
            ScriptIndexes::of(&[1, 2]),
            BTreeSet::from([Qualifier::named("patch")]),
            None,
            "orders",
            ScriptKind::Incremental,
            "CREATE TABLE orders (id int);",
        )
    }

    #[test]
    fn test_pending_record_is_not_successful() {
        let script = script();
        let mut record = ExecutedScript::pending(&script);
        assert!(!record.succeeded);
        assert_eq!(record.key(), script.key());
        assert_eq!(record.checksum, script.checksum);

        record.finish(true);
        assert!(record.succeeded);
    }

    #[test]
    fn test_identity_text() {
        let record = ExecutedScript::succeeded(&script());
        assert_eq!(record.identity(), "1.2|patch||01_schema/02_#patch_orders.sql");
    }

    #[test]
    fn test_serializes_qualifiers_as_names() {
        let json = serde_json::to_string(&ExecutedScript::succeeded(&script())).unwrap();
        assert!(json.contains("\"qualifiers\":[\"patch\"]"));
        assert!(json.contains("\"indexes\":\"1.2\""));
    }
}
