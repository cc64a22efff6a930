//! Backend instance capability.
//!
//! [`Instance`] is the only boundary between the sync core and a backend. Every
//! core component receives the instances it talks to as explicit arguments.

pub mod directus;
pub mod endpoint;
pub mod factory;

pub use directus::DirectusClient;
pub use endpoint::{collection_endpoint, public_url_from_admin};
pub use factory::create_instance;

use async_trait::async_trait;
use serde_json::Value;

use crate::activity::{ActivityPage, ActivityQuery};
use crate::error::Result;
use crate::model::{Collection, DiffOutcome, FolderRaw, SchemaDiff, SchemaSnapshot};
use crate::transfer::ExportPayload;

/// An authenticated handle to one backend instance.
#[async_trait]
pub trait Instance: Send + Sync {
    /// Label used in logs
    fn name(&self) -> &str;

    /// Capture the full schema of this instance
    async fn schema_snapshot(&self) -> Result<SchemaSnapshot>;

    /// Compare a snapshot against this instance's live schema
    async fn schema_diff(&self, snapshot: &SchemaSnapshot) -> Result<DiffOutcome>;

    /// Apply a diff to this instance's schema
    async fn schema_apply(&self, diff: &SchemaDiff) -> Result<()>;

    /// One page of activity records
    async fn read_activities(&self, query: &ActivityQuery) -> Result<ActivityPage>;

    /// Upload serialized collection data through the import endpoint
    async fn import_data(&self, collection: &str, payload: &ExportPayload) -> Result<()>;

    /// Patch a collection's definition (typically its `meta` block)
    async fn update_collection(&self, collection: &str, patch: &Value) -> Result<Collection>;

    async fn read_collections(&self) -> Result<Vec<Collection>>;

    async fn create_collection(&self, definition: &Value) -> Result<Collection>;

    /// Every item of a collection
    async fn read_items(&self, collection: &str) -> Result<Vec<Value>>;

    async fn read_folders(&self) -> Result<Vec<FolderRaw>>;

    /// Full export of a collection as a JSON file
    async fn export_collection(&self, collection: &str) -> Result<ExportPayload>;
}
