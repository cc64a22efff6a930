use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use std::cmp::Ordering;

use super::Collectionable;
use crate::activity::compare_timestamps;

/// One logical entity type in the backend schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CollectionMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Populated from the bookkeeping collection, never sent to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_schema: Option<ExportSchemaConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Export rules for one collection and the collections reachable from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportElement {
    /// Omitted on a collection's own rules, where it is implied
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_collections: Option<Vec<ExportElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_collections: Option<Vec<ExportElement>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSchemaConfig {
    #[serde(default)]
    pub export: bool,
    #[serde(flatten)]
    pub element: ExportElement,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            meta: None,
            schema: None,
            last_sync_date: None,
            extra: Map::new(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.meta.as_ref().and_then(|m| m.system).unwrap_or(false)
    }

    pub fn imported_at(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.imported_at.as_deref())
    }

    /// Fields the export rules ask to leave out
    pub fn export_exclude_fields(&self) -> &[String] {
        self.meta
            .as_ref()
            .and_then(|m| m.export_schema.as_ref())
            .and_then(|e| e.element.exclude_fields.as_deref())
            .unwrap_or(&[])
    }

    /// Most recent known sync point, whichever of the two stamps is later
    pub fn synced_at(&self) -> Option<&str> {
        match (self.imported_at(), self.last_sync_date.as_deref()) {
            (Some(a), Some(b)) => Some(match compare_timestamps(a, b) {
                Ordering::Less => b,
                _ => a,
            }),
            (a, b) => a.or(b),
        }
    }
}

impl Collectionable for Collection {
    fn collection(&self) -> &str {
        &self.collection
    }
}

/// Partition collections into user-defined and built-in ones, keeping order.
pub fn split_collections(collections: &[Collection]) -> (Vec<Collection>, Vec<Collection>) {
    collections
        .iter()
        .cloned()
        .partition(|collection| !collection.is_system())
}
