//! Database object identifiers and identifier quoting.
//!
//! Object names reach generated DDL (`DROP TABLE`, `DELETE FROM`) and cannot be
//! bound as statement parameters, so every name is validated and quoted here
//! before it is spliced into SQL.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MaintainError, Result};

/// Maximum identifier length (conservative limit across databases).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Kinds of structural objects the clearer knows how to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbItemType {
    Table,
    View,
    MaterializedView,
    Synonym,
    Sequence,
    Trigger,
    Type,
}

impl DbItemType {
    /// Drop order used by the clearer: dependants before what they depend on.
    pub const DROP_ORDER: [DbItemType; 7] = [
        DbItemType::MaterializedView,
        DbItemType::View,
        DbItemType::Synonym,
        DbItemType::Trigger,
        DbItemType::Table,
        DbItemType::Sequence,
        DbItemType::Type,
    ];

    /// SQL keyword for the object kind.
    pub fn keyword(&self) -> &'static str {
        match self {
            DbItemType::Table => "TABLE",
            DbItemType::View => "VIEW",
            DbItemType::MaterializedView => "MATERIALIZED VIEW",
            DbItemType::Synonym => "SYNONYM",
            DbItemType::Sequence => "SEQUENCE",
            DbItemType::Trigger => "TRIGGER",
            DbItemType::Type => "TYPE",
        }
    }
}

impl fmt::Display for DbItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// How a database stores identifiers that were not quoted when created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierCase {
    /// PostgreSQL folds unquoted names to lower case.
    #[default]
    Lower,
    /// Oracle, DB2, H2, HSQLDB and Derby fold to upper case.
    Upper,
    /// SQL Server and MySQL keep the case but compare case-insensitively.
    Mixed,
}

impl IdentifierCase {
    /// Normalize an unquoted identifier the way the catalog would report it.
    pub fn normalize(&self, name: &str) -> String {
        match self {
            IdentifierCase::Lower => name.to_lowercase(),
            IdentifierCase::Upper => name.to_uppercase(),
            IdentifierCase::Mixed => name.to_string(),
        }
    }

    /// Key used for membership tests. Mixed-case catalogs compare without case.
    pub fn comparison_key(&self, name: &str) -> String {
        match self {
            IdentifierCase::Mixed => name.to_lowercase(),
            _ => name.to_string(),
        }
    }
}

/// A (type, schema, name) triple identifying a database object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DbItemIdentifier {
    pub item_type: DbItemType,
    pub schema: String,
    pub name: String,
}

impl DbItemIdentifier {
    pub fn new(item_type: DbItemType, schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            item_type,
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Quoted `schema.name` for PostgreSQL DDL.
    pub fn qualified_pg(&self) -> Result<String> {
        qualify_pg(&self.schema, &self.name)
    }
}

impl fmt::Display for DbItemIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.item_type, self.schema, self.name)
    }
}

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MaintainError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MaintainError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MaintainError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a PostgreSQL object name with its schema.
pub fn qualify_pg(schema: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(name)?))
}

/// Split a configured `name` or `schema.name` reference.
///
/// Parts written as `"Quoted"` keep their case verbatim; unquoted parts are
/// normalized with `case`. Returns `(schema, name)` where the schema falls back
/// to `default_schema`.
pub fn parse_qualified_name(
    entry: &str,
    default_schema: &str,
    case: IdentifierCase,
) -> Result<(String, String)> {
    let parts = split_unquoted_dots(entry.trim())?;
    let normalized = parts
        .iter()
        .map(|part| normalize_part(part, case))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| MaintainError::Config(format!("Malformed object reference '{}': {}", entry, e)))?;

    match normalized.as_slice() {
        [name] => Ok((case.normalize(default_schema), name.clone())),
        [schema, name] => Ok((schema.clone(), name.clone())),
        _ => Err(MaintainError::Config(format!(
            "Malformed object reference '{}': expected 'name' or 'schema.name'",
            entry
        ))),
    }
}

/// Normalize a configured schema name; a dotted reference is an error.
pub fn parse_schema_name(entry: &str, case: IdentifierCase) -> Result<String> {
    let parts = split_unquoted_dots(entry.trim())?;
    match parts.as_slice() {
        [schema] => normalize_part(schema, case)
            .map_err(|e| MaintainError::Config(format!("Malformed schema reference '{}': {}", entry, e))),
        _ => Err(MaintainError::Config(format!(
            "Malformed schema reference '{}': expected a single name",
            entry
        ))),
    }
}

/// Split on dots that are outside double quotes.
fn split_unquoted_dots(entry: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in entry.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(MaintainError::Config(format!(
            "Malformed object reference '{}': unbalanced double quote",
            entry
        )));
    }
    parts.push(current);
    Ok(parts)
}

fn normalize_part(part: &str, case: IdentifierCase) -> Result<String> {
    let part = part.trim();
    let name = if part.len() >= 2 && part.starts_with('"') && part.ends_with('"') {
        part[1..part.len() - 1].replace("\"\"", "\"")
    } else {
        case.normalize(part)
    };
    validate_identifier(&name)?;
    Ok(name)
}
