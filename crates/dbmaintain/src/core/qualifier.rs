//! Script qualifiers and the include/exclude evaluator.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MaintainError, Result};

/// Configuration spelling of the [`Qualifier::Unqualified`] sentinel.
pub const UNQUALIFIED: &str = "<unqualified>";

/// A tag on a script used to include it in, or exclude it from, a run.
///
/// `Unqualified` stands for "this script carries no qualifier at all" so that
/// configuration can target plain scripts. It is a separate case and never
/// collides with a registered name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Qualifier {
    Unqualified,
    Named(String),
}

impl Qualifier {
    /// Named qualifier, normalized to lower case.
    pub fn named(name: &str) -> Self {
        Qualifier::Named(name.trim().to_lowercase())
    }

    /// Parse a qualifier reference from configuration, where the sentinel is
    /// spelled [`UNQUALIFIED`].
    pub fn from_config(name: &str) -> Self {
        if name.trim() == UNQUALIFIED {
            Qualifier::Unqualified
        } else {
            Qualifier::named(name)
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Qualifier::Unqualified => UNQUALIFIED,
            Qualifier::Named(name) => name,
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for Qualifier {
    fn from(value: String) -> Self {
        Qualifier::from_config(&value)
    }
}

impl From<Qualifier> for String {
    fn from(value: Qualifier) -> Self {
        value.name().to_string()
    }
}

/// Decides whether a script is eligible for the current run.
#[derive(Debug, Clone, Default)]
pub struct QualifierEvaluator {
    included: BTreeSet<Qualifier>,
    excluded: BTreeSet<Qualifier>,
}

impl QualifierEvaluator {
    /// Build an evaluator, rejecting references to unregistered qualifiers.
    ///
    /// The sentinel is always valid and needs no registration.
    pub fn new(
        registered: &BTreeSet<Qualifier>,
        included: impl IntoIterator<Item = Qualifier>,
        excluded: impl IntoIterator<Item = Qualifier>,
    ) -> Result<Self> {
        let included: BTreeSet<Qualifier> = included.into_iter().collect();
        let excluded: BTreeSet<Qualifier> = excluded.into_iter().collect();

        for (list, qualifiers) in [("included", &included), ("excluded", &excluded)] {
            for qualifier in qualifiers {
                if *qualifier != Qualifier::Unqualified && !registered.contains(qualifier) {
                    return Err(MaintainError::Config(format!(
                        "Qualifier '{}' in the {} qualifiers is not registered (registered: {})",
                        qualifier,
                        list,
                        join(registered)
                    )));
                }
            }
        }

        Ok(Self { included, excluded })
    }

    /// An evaluator that accepts every script.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// True when a script carrying `qualifiers` may run.
    pub fn evaluate(&self, qualifiers: &BTreeSet<Qualifier>) -> bool {
        let unqualified;
        let effective = if qualifiers.is_empty() {
            unqualified = BTreeSet::from([Qualifier::Unqualified]);
            &unqualified
        } else {
            qualifiers
        };

        let included =
            self.included.is_empty() || !self.included.is_disjoint(effective);
        included && self.excluded.is_disjoint(effective)
    }
}

/// Render a qualifier set as a sorted, comma separated list.
pub fn join(qualifiers: &BTreeSet<Qualifier>) -> String {
    qualifiers
        .iter()
        .map(Qualifier::name)
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`join`]; blank input is the empty set.
pub fn split(text: &str) -> BTreeSet<Qualifier> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Qualifier::from_config)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<Qualifier> {
        names.iter().map(|n| Qualifier::named(n)).collect()
    }

    fn registered() -> BTreeSet<Qualifier> {
        set(&["patch", "slow", "mysql"])
    }

    #[test]
    fn test_names_are_normalized() {
        assert_eq!(Qualifier::named(" PATCH "), Qualifier::named("patch"));
        assert_eq!(Qualifier::from_config("<unqualified>"), Qualifier::Unqualified);
    }

    #[test]
    fn test_sentinel_text_does_not_collide_with_named() {
        assert_ne!(Qualifier::Named(UNQUALIFIED.to_string()), Qualifier::Unqualified);
    }

    #[test]
    fn test_unregistered_excluded_qualifier_is_config_error() {
        let err = QualifierEvaluator::new(&registered(), vec![], vec![Qualifier::named("fast")])
            .unwrap_err();
        assert!(matches!(err, MaintainError::Config(ref m) if m.contains("fast")));
    }

    #[test]
    fn test_unregistered_included_qualifier_is_config_error() {
        assert!(
            QualifierEvaluator::new(&registered(), vec![Qualifier::named("oracle")], vec![])
                .is_err()
        );
    }

    #[test]
    fn test_sentinel_needs_no_registration() {
        assert!(
            QualifierEvaluator::new(&BTreeSet::new(), vec![Qualifier::Unqualified], vec![])
                .is_ok()
        );
    }

    #[test]
    fn test_excluded_only() {
        let eval =
            QualifierEvaluator::new(&registered(), vec![], vec![Qualifier::named("slow")]).unwrap();
        assert!(!eval.evaluate(&set(&["slow"])));
        assert!(!eval.evaluate(&set(&["slow", "patch"])));
        assert!(eval.evaluate(&set(&[])));
        assert!(eval.evaluate(&set(&["patch"])));
    }

    #[test]
    fn test_include_unqualified_only() {
        let eval =
            QualifierEvaluator::new(&registered(), vec![Qualifier::Unqualified], vec![]).unwrap();
        assert!(eval.evaluate(&set(&[])));
        assert!(!eval.evaluate(&set(&["patch"])));
    }

    #[test]
    fn test_exclude_unqualified() {
        let eval =
            QualifierEvaluator::new(&registered(), vec![], vec![Qualifier::Unqualified]).unwrap();
        assert!(!eval.evaluate(&set(&[])));
        assert!(eval.evaluate(&set(&["mysql"])));
    }

    #[test]
    fn test_include_and_exclude_combined() {
        let eval = QualifierEvaluator::new(
            &registered(),
            vec![Qualifier::named("mysql"), Qualifier::Unqualified],
            vec![Qualifier::named("slow")],
        )
        .unwrap();
        assert!(eval.evaluate(&set(&["mysql"])));
        assert!(eval.evaluate(&set(&[])));
        assert!(!eval.evaluate(&set(&["mysql", "slow"])));
        assert!(!eval.evaluate(&set(&["patch"])));
    }

    #[test]
    fn test_accept_all() {
        let eval = QualifierEvaluator::accept_all();
        assert!(eval.evaluate(&set(&[])));
        assert!(eval.evaluate(&set(&["anything"])));
    }

    #[test]
    fn test_join_and_split() {
        let qualifiers = set(&["slow", "patch"]);
        assert_eq!(join(&qualifiers), "patch,slow");
        assert_eq!(split("patch, slow"), qualifiers);
        assert!(split("").is_empty());
    }
}
