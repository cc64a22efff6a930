//! Detection of relational and instance-specific reference fields.
//!
//! Foreign keys and UUID references only make sense on the instance that issued
//! them, so they are cleared before a collection's data is carried elsewhere.

use crate::index::ListIndex;
use crate::model::{Collection, Field};

/// Name of the primary-key field that is never treated as a reference
pub const PRIMARY_KEY_FIELD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    O2o,
    O2m,
    M2o,
    M2m,
    M2a,
}

impl RelationKind {
    pub const ALL: [RelationKind; 5] = [
        RelationKind::O2o,
        RelationKind::O2m,
        RelationKind::M2o,
        RelationKind::M2m,
        RelationKind::M2a,
    ];

    pub fn from_special(tag: &str) -> Option<Self> {
        match tag {
            "o2o" => Some(RelationKind::O2o),
            "o2m" => Some(RelationKind::O2m),
            "m2o" => Some(RelationKind::M2o),
            "m2m" => Some(RelationKind::M2m),
            "m2a" => Some(RelationKind::M2a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::O2o => "o2o",
            RelationKind::O2m => "o2m",
            RelationKind::M2o => "m2o",
            RelationKind::M2m => "m2m",
            RelationKind::M2a => "m2a",
        }
    }
}

/// Whether a field holds a relation or a non-primary UUID reference.
pub fn is_reference_field(field: &Field) -> bool {
    let relational = field
        .primary_special()
        .and_then(RelationKind::from_special)
        .is_some();
    let foreign_uuid =
        field.field_type.as_deref() == Some("uuid") && field.field != PRIMARY_KEY_FIELD;
    relational || foreign_uuid
}

/// Reference fields of `collection`, in the collection's field order.
pub fn classify(fields: &ListIndex<Field>, collection: &str) -> Vec<String> {
    let Some(collection_fields) = fields.get(collection) else {
        return Vec::new();
    };

    collection_fields
        .iter()
        .filter(|field| is_reference_field(field))
        .map(|field| field.field.clone())
        .collect()
}

/// Fields to clear before exporting `collection`: reference fields followed by
/// the collection's own `exclude_fields` rules, without duplicates.
pub fn redaction_plan(fields: &ListIndex<Field>, collection: &Collection) -> Vec<String> {
    let mut plan = classify(fields, &collection.collection);
    for name in collection.export_exclude_fields() {
        if !plan.contains(name) {
            plan.push(name.clone());
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::list_by_collection;
    use crate::model::{CollectionMeta, ExportElement, ExportSchemaConfig};

    fn sample_index() -> ListIndex<Field> {
        list_by_collection(&[
            Field::new("posts", "id").with_type("uuid"),
            Field::new("posts", "owner").with_type("uuid"),
            Field::new("posts", "tags").with_special(&["m2m"]),
            Field::new("posts", "title").with_type("string"),
            Field::new("posts", "created_by").with_special(&["user-created"]).with_type("uuid"),
            Field::new("posts", "cast").with_special(&["cast-json", "m2o"]),
            Field::new("tags", "name").with_type("string"),
        ])
    }

    #[test]
    fn selects_relations_and_foreign_uuids() {
        assert_eq!(
            classify(&sample_index(), "posts"),
            vec!["owner", "tags", "created_by"]
        );
    }

    #[test]
    fn only_first_special_tag_counts() {
        let index = sample_index();
        assert!(!classify(&index, "posts").contains(&"cast".to_string()));
    }

    #[test]
    fn unknown_collection_yields_nothing() {
        assert!(classify(&sample_index(), "missing").is_empty());
        assert!(classify(&sample_index(), "tags").is_empty());
    }

    #[test]
    fn every_relation_kind_is_recognized() {
        for kind in RelationKind::ALL {
            assert_eq!(RelationKind::from_special(kind.as_str()), Some(kind));
        }
        assert_eq!(RelationKind::from_special("file"), None);
    }

    #[test]
    fn plan_appends_export_exclusions() {
        let mut collection = Collection::new("posts");
        collection.meta = Some(CollectionMeta {
            export_schema: Some(ExportSchemaConfig {
                export: true,
                element: ExportElement {
                    collection: "posts".to_string(),
                    exclude_fields: Some(vec!["title".to_string(), "owner".to_string()]),
                    ..Default::default()
                },
            }),
            ..Default::default()
        });

        assert_eq!(
            redaction_plan(&sample_index(), &collection),
            vec!["owner", "tags", "created_by", "title"]
        );
    }
}
