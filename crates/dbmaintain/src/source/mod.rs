//! Script repository.
//!
//! A [`ScriptSource`] produces the scripts currently in the repository.
//! [`FileSystemScriptSource`] walks configured directories; the in-memory
//! source backs tests and embedders that generate scripts themselves.

mod filesystem;
mod name;

pub use filesystem::FileSystemScriptSource;
pub use name::ScriptNameParser;

use std::collections::BTreeMap;

use crate::core::Script;
use crate::error::{MaintainError, Result};

/// Supplier of repository scripts.
///
/// Every call returns the full, current set; callers may call it repeatedly.
pub trait ScriptSource: Send + Sync {
    fn load_scripts(&self) -> Result<Vec<Script>>;

    /// Human readable description for logs.
    fn describe(&self) -> String;
}

/// Fixed script list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScriptSource {
    scripts: Vec<Script>,
}

impl InMemoryScriptSource {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self { scripts }
    }
}

impl ScriptSource for InMemoryScriptSource {
    fn load_scripts(&self) -> Result<Vec<Script>> {
        check_unique_indexes(&self.scripts)?;
        Ok(self.scripts.clone())
    }

    fn describe(&self) -> String {
        format!("{} in-memory scripts", self.scripts.len())
    }
}

/// Reject two incremental scripts that would be indistinguishable in order:
/// same indexes, qualifiers and target database.
pub fn check_unique_indexes(scripts: &[Script]) -> Result<()> {
    let mut seen = BTreeMap::new();
    for script in scripts.iter().filter(|s| s.is_incremental()) {
        let identity = (
            script.indexes.clone(),
            script.qualifiers.clone(),
            script.target_database.clone(),
        );
        if let Some(other) = seen.insert(identity, script.file_name.as_str()) {
            return Err(MaintainError::Config(format!(
                "Scripts '{}' and '{}' have the same index {}",
                other, script.file_name, script.indexes
            )));
        }
    }
    Ok(())
}
