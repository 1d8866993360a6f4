//! Hierarchical script versions.
//!
//! Every path segment of a script contributes one part to its [`ScriptIndexes`]:
//! `01_schema/02_tables.sql` becomes `[1, 2]` and `01_schema/views.sql` becomes
//! `[1, x]`, where `x` is the explicit "no index" marker. The ordering defined
//! here decides execution order and drives the out-of-order checks in
//! reconciliation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MaintainError, Result};

/// Text form of the "no index" marker.
const NO_INDEX: &str = "x";

/// Ordered sequence of optional indexes; `None` is the "no index" marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScriptIndexes(Vec<Option<u64>>);

impl ScriptIndexes {
    pub fn new(parts: Vec<Option<u64>>) -> Self {
        Self(parts)
    }

    /// Build from concrete indexes only.
    pub fn of(parts: &[u64]) -> Self {
        Self(parts.iter().copied().map(Some).collect())
    }

    pub fn parts(&self) -> &[Option<u64>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the last part (the file's own segment) carries an index.
    pub fn is_indexed(&self) -> bool {
        matches!(self.0.last(), Some(Some(_)))
    }
}

/// Compare two parts at the same position; the marker sorts after every index.
fn compare_part(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for ScriptIndexes {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match compare_part(*a, *b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        // Shared prefix is equal: the sequence that ran out of parts is lower,
        // whatever the longer one's extra part is.
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for ScriptIndexes {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScriptIndexes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .0
            .iter()
            .map(|part| match part {
                Some(index) => index.to_string(),
                None => NO_INDEX.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&text)
    }
}

impl FromStr for ScriptIndexes {
    type Err = MaintainError;

    /// Parse the dotted form, e.g. `1.2.x`. The empty string is the empty version.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }
        s.split('.')
            .map(|part| {
                let part = part.trim();
                if part.eq_ignore_ascii_case(NO_INDEX) {
                    Ok(None)
                } else {
                    part.parse::<u64>().map(Some).map_err(|_| {
                        MaintainError::Config(format!(
                            "Invalid version '{}': part '{}' is neither an index nor '{}'",
                            s, part, NO_INDEX
                        ))
                    })
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl TryFrom<String> for ScriptIndexes {
    type Error = MaintainError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ScriptIndexes> for String {
    fn from(value: ScriptIndexes) -> Self {
        value.to_string()
    }
}
