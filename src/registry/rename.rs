//! Historical package renames.
//!
//! Old tags and branches still require packages under names that were moved
//! before the registry tracked "abandoned"/"replaced by" information. Those
//! names are looked up under their current name instead.

use std::collections::HashMap;

/// Default renames. Each entry is a historical fact, not a rule.
const DEFAULT_RENAMES: &[(&str, &str)] = &[
    ("symfony/translator", "symfony/translation"),
    // Moved to the Doctrine organization in January 2012 (Symfony 2.1).
    ("symfony/doctrine-bundle", "doctrine/doctrine-bundle"),
    ("metadata/metadata", "jms/metadata"),
    ("zendframework/zend-registry", "zf1/zend-registry"),
];

/// Obsolete package name -> canonical package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameTable {
    renames: HashMap<String, String>,
}

impl Default for RenameTable {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_RENAMES.iter().copied())
    }
}

impl RenameTable {
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            renames: pairs
                .into_iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// The name to look `name` up under.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.renames.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_renames() {
        let table = RenameTable::default();
        assert_eq!(table.len(), 4);
        assert_eq!(table.canonical("symfony/translator"), "symfony/translation");
        assert_eq!(
            table.canonical("symfony/doctrine-bundle"),
            "doctrine/doctrine-bundle"
        );
        assert_eq!(table.canonical("metadata/metadata"), "jms/metadata");
        assert_eq!(
            table.canonical("zendframework/zend-registry"),
            "zf1/zend-registry"
        );
    }

    #[test]
    fn test_unknown_names_pass_through() {
        let table = RenameTable::default();
        assert_eq!(table.canonical("symfony/console"), "symfony/console");
        assert_eq!(
            RenameTable::from_pairs([]).canonical("symfony/translator"),
            "symfony/translator"
        );
    }

    #[test]
    fn test_extra_renames_are_additive() {
        let table = RenameTable::from_pairs(
            DEFAULT_RENAMES
                .iter()
                .copied()
                .chain([("old/name", "new/name")]),
        );
        assert_eq!(table.len(), 5);
        assert_eq!(table.canonical("symfony/translator"), "symfony/translation");
        assert_eq!(table.canonical("old/name"), "new/name");
    }
}
