//! Collections that schema sync must never create or alter on a target.

use std::collections::BTreeMap;

use crate::model::SchemaDiff;

/// Bookkeeping collection holding per-collection sync dates
pub const BOOKKEEPING_COLLECTION: &str = "directus-extension-schema-export_export-date";

/// Built-in protected collections
pub const PROTECTED_COLLECTIONS: &[(&str, bool)] = &[(BOOKKEEPING_COLLECTION, true)];

/// Collection name -> protected flag. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSet {
    entries: BTreeMap<String, bool>,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::protected()
    }
}

impl ExclusionSet {
    /// The built-in set
    pub fn protected() -> Self {
        Self {
            entries: PROTECTED_COLLECTIONS
                .iter()
                .map(|(name, flag)| (name.to_string(), *flag))
                .collect(),
        }
    }

    /// The built-in set extended with more protected collections
    pub fn with_additional<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::protected();
        for name in extra {
            set.entries.insert(name.into(), true);
        }
        set
    }

    pub fn is_excluded(&self, collection: &str) -> bool {
        self.entries.get(collection).copied().unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, flag)| **flag)
            .map(|(name, _)| name.as_str())
    }

    /// A copy of `diff` without entries for excluded collections, in every
    /// category, plus the number of entries removed. `diff` is not modified.
    pub fn filter(&self, diff: &SchemaDiff) -> (SchemaDiff, usize) {
        let mut filtered = diff.clone();
        let mut removed = 0;
        for entries in filtered.diff.values_mut() {
            let before = entries.len();
            entries.retain(|entry| !self.is_excluded(&entry.collection));
            removed += before - entries.len();
        }
        (filtered, removed)
    }
}
