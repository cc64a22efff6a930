//! Indexing of collection-tagged records.
//!
//! Snapshot fragments arrive as flat arrays. These helpers turn them into maps
//! keyed by collection name without touching the input.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::model::{Collection, Collectionable, Field, Relation, SchemaSnapshot};

/// Collection name -> the last record seen for that name.
pub type RecordIndex<T> = HashMap<String, T>;

/// Collection name -> every record for that name, in input order.
/// Groups are kept in order of first appearance.
pub type ListIndex<T> = IndexMap<String, Vec<T>>;

/// Map each collection name to a single representative record.
///
/// Duplicate names resolve last-write-wins.
pub fn record_by_collection<T>(items: &[T]) -> RecordIndex<T>
where
    T: Collectionable + Clone,
{
    let mut index = HashMap::with_capacity(items.len());
    for item in items {
        index.insert(item.collection().to_string(), item.clone());
    }
    index
}

/// Group records by collection name.
pub fn list_by_collection<T>(items: &[T]) -> ListIndex<T>
where
    T: Collectionable + Clone,
{
    let mut index: ListIndex<T> = IndexMap::new();
    for item in items {
        index
            .entry(item.collection().to_string())
            .or_default()
            .push(item.clone());
    }
    index
}

/// The three indexes built from one snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    pub collections: RecordIndex<Collection>,
    pub fields: ListIndex<Field>,
    pub relations: ListIndex<Relation>,
}

impl SnapshotIndex {
    pub fn build(snapshot: &SchemaSnapshot) -> Self {
        Self {
            collections: record_by_collection(&snapshot.typed_collections()),
            fields: list_by_collection(&snapshot.typed_fields()),
            relations: list_by_collection(&snapshot.typed_relations()),
        }
    }

    pub fn fields_of(&self, collection: &str) -> &[Field] {
        self.fields.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn relations_of(&self, collection: &str) -> &[Relation] {
        self.relations
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
