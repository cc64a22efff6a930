use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Collectionable;

/// A single column of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub collection: String,
    pub field: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<FieldMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Special tags; the first one marks the relation kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Field {
    pub fn new(collection: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            field_type: None,
            meta: None,
            schema: None,
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = Some(field_type.into());
        self
    }

    pub fn with_special(mut self, special: &[&str]) -> Self {
        let meta = self.meta.get_or_insert_with(FieldMeta::default);
        meta.special = Some(special.iter().map(|s| s.to_string()).collect());
        self
    }

    /// First entry of `meta.special`
    pub fn primary_special(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|m| m.special.as_ref())
            .and_then(|s| s.first())
            .map(String::as_str)
    }
}

impl Collectionable for Field {
    fn collection(&self) -> &str {
        &self.collection
    }
}

/// A relationship declared on a collection field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub collection: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Collectionable for Relation {
    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_round_trips() {
        let raw = json!({
            "collection": "posts",
            "field": "author",
            "type": "uuid",
            "meta": {"special": ["m2o"], "interface": "select-dropdown-m2o"},
            "schema": {"is_nullable": true}
        });
        let field: Field = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(field.field_type.as_deref(), Some("uuid"));
        assert_eq!(field.primary_special(), Some("m2o"));
        assert_eq!(serde_json::to_value(&field).unwrap(), raw);
    }

    #[test]
    fn null_meta_is_accepted() {
        let field: Field =
            serde_json::from_value(json!({"collection": "posts", "field": "id", "meta": null}))
                .unwrap();
        assert!(field.meta.is_none());
        assert_eq!(field.primary_special(), None);
    }

    #[test]
    fn relation_keeps_related_collection() {
        let relation: Relation = serde_json::from_value(json!({
            "collection": "posts",
            "field": "author",
            "related_collection": "directus_users",
            "meta": {"one_field": null}
        }))
        .unwrap();
        assert_eq!(relation.related_collection.as_deref(), Some("directus_users"));
    }
}
