//! The bookkeeping collection that records per-collection sync dates.
//!
//! It is protected from schema sync (see [`ExclusionSet`]) and provisioned on
//! each instance separately.
//!
//! [`ExclusionSet`]: super::ExclusionSet

use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

use super::exclusion::BOOKKEEPING_COLLECTION;
use crate::client::Instance;
use crate::error::Result;
use crate::model::Collection;

/// Collection definition used to provision the bookkeeping collection.
pub fn bookkeeping_definition() -> Value {
    json!({
        "collection": BOOKKEEPING_COLLECTION,
        "schema": {
            "comment": null,
            "name": BOOKKEEPING_COLLECTION,
            "schema": "public"
        },
        "meta": {
            "accountability": "all",
            "archive_app_filter": true,
            "archive_field": null,
            "archive_value": null,
            "collapse": "open",
            "collection": BOOKKEEPING_COLLECTION,
            "color": null,
            "display_template": null,
            "group": null,
            "hidden": false,
            "icon": null,
            "item_duplication_fields": null,
            "note": null,
            "preview_url": null,
            "singleton": false,
            "sort": null,
            "sort_field": null,
            "translations": null,
            "unarchive_value": null,
            "versioning": false
        },
        "fields": [
            {
                "field": "id",
                "type": "string",
                "schema": {"is_primary_key": true, "is_nullable": false}
            },
            {"field": "data_update_date", "type": "string", "schema": {}},
            {"field": "last_sync_date", "type": "string", "schema": {}}
        ]
    })
}

/// Create the bookkeeping collection on `instance` when it is missing.
///
/// Returns `true` when the collection was created.
pub async fn ensure_bookkeeping_collection(instance: &dyn Instance) -> Result<bool> {
    let collections = instance.read_collections().await?;
    if collections
        .iter()
        .any(|c| c.collection == BOOKKEEPING_COLLECTION)
    {
        debug!("Bookkeeping collection already present on {}", instance.name());
        return Ok(false);
    }

    instance.create_collection(&bookkeeping_definition()).await?;
    info!("Provisioned bookkeeping collection on {}", instance.name());
    Ok(true)
}

/// Sync dates recorded in the bookkeeping collection, keyed by collection name.
pub async fn read_sync_dates(instance: &dyn Instance) -> Result<HashMap<String, String>> {
    let items = instance.read_items(BOOKKEEPING_COLLECTION).await?;
    Ok(sync_dates_from_items(&items))
}

fn sync_dates_from_items(items: &[Value]) -> HashMap<String, String> {
    items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?;
            let date = item.get("last_sync_date")?.as_str()?;
            Some((id.to_string(), date.to_string()))
        })
        .collect()
}

/// Fill `last_sync_date` on each collection that has a recorded date.
pub fn attach_last_sync_dates(collections: &mut [Collection], dates: &HashMap<String, String>) {
    for collection in collections.iter_mut() {
        if let Some(date) = dates.get(&collection.collection) {
            collection.last_sync_date = Some(date.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockInstance;

    #[test]
    fn definition_uses_protected_name() {
        let definition = bookkeeping_definition();
        assert_eq!(definition["collection"], BOOKKEEPING_COLLECTION);
        assert_eq!(definition["meta"]["collection"], BOOKKEEPING_COLLECTION);
        let fields: Vec<_> = definition["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, ["id", "data_update_date", "last_sync_date"]);
    }

    #[tokio::test]
    async fn provisions_only_when_missing() {
        let instance = MockInstance::new("target").with_collections(vec![Collection::new("posts")]);

        assert!(ensure_bookkeeping_collection(&instance).await.unwrap());
        assert_eq!(instance.created_collections().len(), 1);

        // The mock now lists the created collection
        assert!(!ensure_bookkeeping_collection(&instance).await.unwrap());
        assert_eq!(instance.created_collections().len(), 1);
    }

    #[tokio::test]
    async fn sync_dates_populate_collections() {
        let instance = MockInstance::new("source").with_items(
            BOOKKEEPING_COLLECTION,
            vec![
                json!({"id": "posts", "last_sync_date": "2024-02-01T00:00:00Z"}),
                json!({"id": "tags", "last_sync_date": null}),
            ],
        );
        let dates = read_sync_dates(&instance).await.unwrap();
        assert_eq!(dates.len(), 1);

        let mut collections = vec![Collection::new("posts"), Collection::new("tags")];
        attach_last_sync_dates(&mut collections, &dates);
        assert_eq!(
            collections[0].last_sync_date.as_deref(),
            Some("2024-02-01T00:00:00Z")
        );
        assert!(collections[1].last_sync_date.is_none());
    }
}
