pub mod bookkeeping;
pub mod engine;
pub mod exclusion;

pub use bookkeeping::{
    attach_last_sync_dates, bookkeeping_definition, ensure_bookkeeping_collection,
    read_sync_dates,
};
pub use engine::{ApplyReport, SchemaSession, SchemaSync, SyncState};
pub use exclusion::{ExclusionSet, BOOKKEEPING_COLLECTION, PROTECTED_COLLECTIONS};
