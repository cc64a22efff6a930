use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{normalize_records, Collection, Field, Relation};

/// Point-in-time capture of an instance's schema.
///
/// Produced once per sync session and never mutated; it is sent back verbatim
/// to the target's diff endpoint. The sections are kept as the backend sent
/// them: a record the typed model cannot read still belongs to the schema, and
/// leaving it out would make the target see it as deleted. Typed views decode
/// on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub collections: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fields: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub relations: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

fn to_values<T: Serialize>(records: &[T]) -> Vec<Value> {
    records
        .iter()
        .filter_map(|record| serde_json::to_value(record).ok())
        .collect()
}

impl SchemaSnapshot {
    pub fn empty() -> Self {
        Self {
            version: Some(1),
            directus: None,
            vendor: None,
            collections: Vec::new(),
            fields: Vec::new(),
            relations: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_collections(mut self, collections: &[Collection]) -> Self {
        self.collections.extend(to_values(collections));
        self
    }

    pub fn with_fields(mut self, fields: &[Field]) -> Self {
        self.fields.extend(to_values(fields));
        self
    }

    pub fn with_relations(mut self, relations: &[Relation]) -> Self {
        self.relations.extend(to_values(relations));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.fields.is_empty() && self.relations.is_empty()
    }

    /// Collections the typed model can read; the others are skipped with a warning
    pub fn typed_collections(&self) -> Vec<Collection> {
        normalize_records(self.collections.clone())
    }

    pub fn typed_fields(&self) -> Vec<Field> {
        normalize_records(self.fields.clone())
    }

    pub fn typed_relations(&self) -> Vec<Relation> {
        normalize_records(self.relations.clone())
    }
}
