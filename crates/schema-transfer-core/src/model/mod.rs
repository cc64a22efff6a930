//! Typed records for the backend's loosely typed JSON payloads.
//!
//! Every record keeps the keys it does not model in a flattened `extra` map so
//! that snapshots and diffs round-trip to the backend without loss.

pub mod activity;
pub mod collection;
pub mod diff;
pub mod field;
pub mod folder;
pub mod snapshot;

pub use activity::{Activity, ActivityAction};
pub use collection::{split_collections, Collection, CollectionMeta, ExportElement, ExportSchemaConfig};
pub use diff::{DiffEntry, DiffOutcome, SchemaDiff};
pub use field::{Field, FieldMeta, Relation};
pub use folder::{build_folder_tree, Folder, FolderRaw};
pub use snapshot::SchemaSnapshot;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Anything tagged with the name of the collection it belongs to.
pub trait Collectionable {
    fn collection(&self) -> &str;
}

impl Collectionable for Value {
    fn collection(&self) -> &str {
        self.get("collection").and_then(Value::as_str).unwrap_or("")
    }
}

/// Parse each element on its own and drop the ones that are malformed or carry
/// no collection tag. Every dropped record is logged.
pub fn normalize_records<T>(values: Vec<Value>) -> Vec<T>
where
    T: DeserializeOwned + Collectionable,
{
    values
        .into_iter()
        .enumerate()
        .filter_map(|(position, value)| {
            let tag = value.collection().to_string();
            match serde_json::from_value::<T>(value) {
                Ok(record) if !record.collection().is_empty() => Some(record),
                Ok(_) => {
                    tracing::warn!("Skipping record #{}: no collection tag", position);
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable record #{} (collection '{}'): {}",
                        position,
                        tag,
                        e
                    );
                    None
                }
            }
        })
        .collect()
}

/// JavaScript-style truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
