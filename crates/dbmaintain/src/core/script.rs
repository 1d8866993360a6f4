//! Script records as discovered in the repository.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::qualifier::Qualifier;
use super::version::ScriptIndexes;

/// How a script participates in updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// Indexed script, runs exactly once.
    Incremental,
    /// Unindexed script, runs again whenever its content changes.
    Repeatable,
    /// Lives in the post-processing directory, runs on every update.
    PostProcessing,
}

/// Identity used to match repository scripts against registry records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptKey {
    pub indexes: ScriptIndexes,
    pub qualifiers: BTreeSet<Qualifier>,
    pub target_database: Option<String>,
    pub file_name: String,
}

impl fmt::Display for ScriptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.file_name, self.indexes)
    }
}

/// One versioned unit of SQL work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    /// Path relative to its script location, with forward slashes.
    pub file_name: String,
    pub indexes: ScriptIndexes,
    pub qualifiers: BTreeSet<Qualifier>,
    pub target_database: Option<String>,
    pub description: String,
    pub kind: ScriptKind,
    #[serde(skip_serializing)]
    pub content: String,
    pub checksum: String,
}

impl Script {
    pub fn new(
        file_name: impl Into<String>,
        indexes: ScriptIndexes,
        qualifiers: BTreeSet<Qualifier>,
        target_database: Option<String>,
        description: impl Into<String>,
        kind: ScriptKind,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let checksum = checksum(&content);
        Self {
            file_name: file_name.into(),
            indexes,
            qualifiers,
            target_database,
            description: description.into(),
            kind,
            content,
            checksum,
        }
    }

    pub fn key(&self) -> ScriptKey {
        ScriptKey {
            indexes: self.indexes.clone(),
            qualifiers: self.qualifiers.clone(),
            target_database: self.target_database.clone(),
            file_name: self.file_name.clone(),
        }
    }

    pub fn is_incremental(&self) -> bool {
        self.kind == ScriptKind::Incremental
    }

    /// True when the script carries any of the given patch qualifiers.
    pub fn is_patch(&self, patch_qualifiers: &BTreeSet<Qualifier>) -> bool {
        !self.qualifiers.is_disjoint(patch_qualifiers)
    }
}

/// SHA-256 hex digest of script content, line endings normalized to `\n`.
pub fn checksum(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}
