//! Script identity from relative file names.
//!
//! `01_schema/02_#patch_@reporting_add_totals.sql` yields indexes `[1, 2]`,
//! qualifier `patch`, target database `reporting` and description
//! `add_totals`.

use std::collections::BTreeSet;

use crate::config::ScriptsConfig;
use crate::core::qualifier::join;
use crate::core::{Qualifier, Script, ScriptIndexes, ScriptKind};
use crate::error::{MaintainError, Result};

/// Turns relative script paths into [`Script`] records.
#[derive(Debug, Clone)]
pub struct ScriptNameParser {
    qualifier_prefix: String,
    target_database_prefix: String,
    postprocessing_dir: String,
    registered: BTreeSet<Qualifier>,
}

impl ScriptNameParser {
    pub fn new(config: &ScriptsConfig, registered: BTreeSet<Qualifier>) -> Self {
        Self {
            qualifier_prefix: config.qualifier_prefix.clone(),
            target_database_prefix: config.target_database_prefix.clone(),
            postprocessing_dir: config.postprocessing_dir.clone(),
            registered,
        }
    }

    /// Build a script from its path relative to the script location.
    pub fn parse(&self, file_name: &str, content: String) -> Result<Script> {
        let file_name = file_name.replace('\\', "/");
        let segments: Vec<&str> = file_name.split('/').filter(|s| !s.is_empty()).collect();
        let Some((file, directories)) = segments.split_last() else {
            return Err(MaintainError::Config(format!(
                "Empty script file name: '{}'",
                file_name
            )));
        };

        let stem = match file.rfind('.') {
            Some(dot) if dot > 0 => &file[..dot],
            _ => file,
        };

        let mut parts = Vec::with_capacity(segments.len());
        for directory in directories {
            let (index, _) = split_index(&file_name, directory)?;
            parts.push(index);
        }
        let (index, rest) = split_index(&file_name, stem)?;
        parts.push(index);

        let (qualifiers, target_database, description) = self.split_tokens(&file_name, rest)?;

        let post_processing = directories
            .iter()
            .any(|d| d.eq_ignore_ascii_case(&self.postprocessing_dir));
        let kind = if post_processing {
            ScriptKind::PostProcessing
        } else if index.is_some() {
            ScriptKind::Incremental
        } else {
            ScriptKind::Repeatable
        };

        Ok(Script::new(
            file_name.clone(),
            ScriptIndexes::new(parts),
            qualifiers,
            target_database,
            description,
            kind,
            content,
        ))
    }

    fn split_tokens(
        &self,
        file_name: &str,
        rest: &str,
    ) -> Result<(BTreeSet<Qualifier>, Option<String>, String)> {
        let mut qualifiers = BTreeSet::new();
        let mut target_database = None;
        let mut tokens = rest.split('_').peekable();

        while let Some(token) = tokens.peek() {
            if let Some(name) = token.strip_prefix(self.qualifier_prefix.as_str()) {
                let qualifier = self.registered_qualifier(file_name, name)?;
                qualifiers.insert(qualifier);
            } else if let Some(name) = token.strip_prefix(self.target_database_prefix.as_str()) {
                if name.is_empty() || target_database.is_some() {
                    return Err(MaintainError::Config(format!(
                        "Script '{}' has an empty or repeated target database token",
                        file_name
                    )));
                }
                target_database = Some(name.to_lowercase());
            } else {
                break;
            }
            tokens.next();
        }

        let description = tokens.collect::<Vec<_>>().join("_");
        Ok((qualifiers, target_database, description))
    }

    fn registered_qualifier(&self, file_name: &str, name: &str) -> Result<Qualifier> {
        if name.trim().is_empty() {
            return Err(MaintainError::Config(format!(
                "Script '{}' has an empty qualifier token",
                file_name
            )));
        }
        let qualifier = Qualifier::named(name);
        if !self.registered.contains(&qualifier) {
            return Err(MaintainError::Config(format!(
                "Script '{}' uses qualifier '{}' which is not registered (registered: {})",
                file_name,
                qualifier,
                join(&self.registered)
            )));
        }
        Ok(qualifier)
    }
}

/// Split a leading `NN_` index off a path segment.
fn split_index<'s>(file_name: &str, segment: &'s str) -> Result<(Option<u64>, &'s str)> {
    let digits = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    if digits == 0 {
        return Ok((None, segment));
    }

    let rest = &segment[digits..];
    let rest = match rest.strip_prefix('_') {
        Some(rest) => rest,
        None if rest.is_empty() => rest,
        // "2fa_setup" is a name, not an index
        None => return Ok((None, segment)),
    };

    let index = segment[..digits].parse::<u64>().map_err(|e| {
        MaintainError::Config(format!(
            "Script '{}' has an index out of range in '{}': {}",
            file_name, segment, e
        ))
    })?;
    Ok((Some(index), rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ScriptNameParser {
        let registered = BTreeSet::from([Qualifier::named("patch"), Qualifier::named("slow")]);
        ScriptNameParser::new(&ScriptsConfig::default(), registered)
    }

    #[test]
    fn test_indexes_from_every_segment() {
        let script = parser()
            .parse("01_schema/02_tables.sql", "CREATE TABLE t (id int);".into())
            .unwrap();
        assert_eq!(script.indexes, ScriptIndexes::of(&[1, 2]));
        assert_eq!(script.description, "tables");
        assert_eq!(script.kind, ScriptKind::Incremental);
        assert!(script.qualifiers.is_empty());
    }

    #[test]
    fn test_unindexed_file_is_repeatable() {
        let script = parser().parse("01_schema/views.sql", String::new()).unwrap();
        assert_eq!(script.indexes, ScriptIndexes::new(vec![Some(1), None]));
        assert_eq!(script.kind, ScriptKind::Repeatable);
    }

    #[test]
    fn test_qualifiers_and_target_database() {
        let script = parser()
            .parse("3_#Patch_@Reporting_#slow_add_totals.sql", String::new())
            .unwrap();
        assert_eq!(script.indexes, ScriptIndexes::of(&[3]));
        assert_eq!(
            script.qualifiers,
            BTreeSet::from([Qualifier::named("patch"), Qualifier::named("slow")])
        );
        assert_eq!(script.target_database.as_deref(), Some("reporting"));
        assert_eq!(script.description, "add_totals");
    }

    #[test]
    fn test_unregistered_qualifier_is_rejected() {
        let err = parser().parse("1_#hotfix_x.sql", String::new()).unwrap_err();
        assert!(matches!(err, MaintainError::Config(_)));
        assert!(err.to_string().contains("hotfix"));
    }

    #[test]
    fn test_postprocessing_directory() {
        let script = parser()
            .parse("postprocessing/01_grants.sql", String::new())
            .unwrap();
        assert_eq!(script.kind, ScriptKind::PostProcessing);
        assert_eq!(script.indexes, ScriptIndexes::new(vec![None, Some(1)]));
    }

    #[test]
    fn test_digits_without_separator_are_not_an_index() {
        let script = parser().parse("2fa_setup.sql", String::new()).unwrap();
        assert_eq!(script.indexes, ScriptIndexes::new(vec![None]));
        assert_eq!(script.description, "2fa_setup");

        let bare = parser().parse("007.sql", String::new()).unwrap();
        assert_eq!(bare.indexes, ScriptIndexes::of(&[7]));
        assert_eq!(bare.description, "");
    }

    #[test]
    fn test_backslashes_are_normalized() {
        let script = parser().parse("01_a\\02_b.sql", String::new()).unwrap();
        assert_eq!(script.file_name, "01_a/02_b.sql");
    }

    #[test]
    fn test_index_overflow() {
        assert!(parser()
            .parse("99999999999999999999999_x.sql", String::new())
            .is_err());
    }
}
