pub mod activity;
pub mod client;
pub mod error;
pub mod index;
pub mod model;
pub mod redact;
pub mod relations;
pub mod schema;
pub mod test_utils;
pub mod transfer;

pub use activity::{
    ActivityAggregator, ActivityIndex, ActivityPage, ActivityQuery, ACTIVITIES_PER_REQUEST,
};
pub use client::{create_instance, DirectusClient, Instance};
pub use error::{Result, SyncError};
pub use index::{list_by_collection, record_by_collection, ListIndex, RecordIndex, SnapshotIndex};
pub use redact::{redact, redact_value};
pub use relations::{classify, redaction_plan, RelationKind};
pub use schema::{ApplyReport, ExclusionSet, SchemaSession, SchemaSync, SyncState};
pub use transfer::{ExportPayload, ImportReport, Transfer};
