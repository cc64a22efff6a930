use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Collectionable;

/// Changes needed to bring a target schema in line with a snapshot.
///
/// Categories (`collections`, `fields`, `relations`, ...) are kept opaque and in
/// the order the backend sent them. Only the collection tag of each entry is
/// interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub diff: IndexMap<String, Vec<DiffEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One change record. Entries must carry a collection tag; a diff that cannot be
/// attributed to collections is rejected rather than partially applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub collection: String,
    #[serde(flatten)]
    pub change: Map<String, Value>,
}

impl Collectionable for DiffEntry {
    fn collection(&self) -> &str {
        &self.collection
    }
}

impl DiffEntry {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            change: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.change.insert(key.into(), value);
        self
    }
}

impl SchemaDiff {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            diff: IndexMap::new(),
            extra: Map::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>, entries: Vec<DiffEntry>) -> Self {
        self.diff.insert(category.into(), entries);
        self
    }

    /// Total number of change records across all categories
    pub fn entry_count(&self) -> usize {
        self.diff.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Number of change records per category
    pub fn summary(&self) -> Vec<(&str, usize)> {
        self.diff
            .iter()
            .map(|(category, entries)| (category.as_str(), entries.len()))
            .collect()
    }

    /// Distinct collections touched by the diff, in first-appearance order
    pub fn collections(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for entry in self.diff.values().flatten() {
            if !seen.contains(&entry.collection.as_str()) {
                seen.push(&entry.collection);
            }
        }
        seen
    }

    pub fn touches(&self, collection: &str) -> bool {
        self.diff
            .values()
            .flatten()
            .any(|entry| entry.collection == collection)
    }
}

/// Result of asking a target instance for a diff.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// The target answered with no content: schemas already match
    NoChanges,
    Changes(SchemaDiff),
}

impl DiffOutcome {
    pub fn can_apply(&self) -> bool {
        matches!(self, DiffOutcome::Changes(_))
    }

    pub fn diff(&self) -> Option<&SchemaDiff> {
        match self {
            DiffOutcome::Changes(diff) => Some(diff),
            DiffOutcome::NoChanges => None,
        }
    }
}
