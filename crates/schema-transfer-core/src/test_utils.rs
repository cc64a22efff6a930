//! In-memory [`Instance`] for exercising sync flows without a backend.
//!
//! Responses are configured with builder methods; every call that would change
//! the backend is recorded for inspection.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::activity::{ActivityPage, ActivityQuery};
use crate::client::Instance;
use crate::error::{Result, SyncError};
use crate::model::{Activity, Collection, DiffOutcome, FolderRaw, SchemaDiff, SchemaSnapshot};
use crate::transfer::ExportPayload;

#[derive(Debug, Default)]
struct Recorded {
    diff_requests: Vec<SchemaSnapshot>,
    applied: Vec<SchemaDiff>,
    activity_requests: Vec<usize>,
    imports: Vec<(String, ExportPayload)>,
    collection_patches: Vec<(String, Value)>,
    created_collections: Vec<Value>,
    collections: Vec<Collection>,
}

#[derive(Debug)]
pub struct MockInstance {
    name: String,
    snapshot: std::result::Result<SchemaSnapshot, (u16, String)>,
    diff: DiffOutcome,
    apply_rejection: Option<(String, String)>,
    activity_pages: Vec<Vec<Value>>,
    fail_activities_from: Option<usize>,
    exports: HashMap<String, ExportPayload>,
    import_failure: Option<(String, String)>,
    items: HashMap<String, Vec<Value>>,
    folders: Vec<FolderRaw>,
    recorded: Mutex<Recorded>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockInstance {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            snapshot: Ok(SchemaSnapshot::empty()),
            diff: DiffOutcome::NoChanges,
            apply_rejection: None,
            activity_pages: Vec::new(),
            fail_activities_from: None,
            exports: HashMap::new(),
            import_failure: None,
            items: HashMap::new(),
            folders: Vec::new(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    pub fn with_snapshot(mut self, snapshot: SchemaSnapshot) -> Self {
        self.snapshot = Ok(snapshot);
        self
    }

    pub fn fail_snapshot(mut self, status: u16, message: impl Into<String>) -> Self {
        self.snapshot = Err((status, message.into()));
        self
    }

    pub fn with_diff(mut self, outcome: DiffOutcome) -> Self {
        self.diff = outcome;
        self
    }

    pub fn reject_apply(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.apply_rejection = Some((code.into(), message.into()));
        self
    }

    /// Page `n` (1-based) answers with `pages[n - 1]`; later pages are empty.
    pub fn with_activity_pages(self, pages: Vec<Vec<Activity>>) -> Self {
        let raw = pages
            .iter()
            .map(|page| {
                page.iter()
                    .filter_map(|activity| serde_json::to_value(activity).ok())
                    .collect()
            })
            .collect();
        self.with_raw_activity_pages(raw)
    }

    /// Like [`with_activity_pages`](Self::with_activity_pages) with undecoded records
    pub fn with_raw_activity_pages(mut self, pages: Vec<Vec<Value>>) -> Self {
        self.activity_pages = pages;
        self
    }

    /// Requests for `page` and later answer with a 503
    pub fn fail_activities_from_page(mut self, page: usize) -> Self {
        self.fail_activities_from = Some(page);
        self
    }

    pub fn with_export(mut self, collection: impl Into<String>, payload: ExportPayload) -> Self {
        self.exports.insert(collection.into(), payload);
        self
    }

    pub fn fail_imports_with(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.import_failure = Some((code.into(), message.into()));
        self
    }

    pub fn with_collections(self, collections: Vec<Collection>) -> Self {
        lock(&self.recorded).collections = collections;
        self
    }

    pub fn with_items(mut self, collection: impl Into<String>, items: Vec<Value>) -> Self {
        self.items.insert(collection.into(), items);
        self
    }

    pub fn with_folders(mut self, folders: Vec<FolderRaw>) -> Self {
        self.folders = folders;
        self
    }

    /// Snapshots received by the diff endpoint
    pub fn diff_requests(&self) -> Vec<SchemaSnapshot> {
        lock(&self.recorded).diff_requests.clone()
    }

    /// Diffs submitted to the apply endpoint, rejected ones included
    pub fn applied(&self) -> Vec<SchemaDiff> {
        lock(&self.recorded).applied.clone()
    }

    /// Page numbers requested from the activity endpoint
    pub fn activity_requests(&self) -> Vec<usize> {
        lock(&self.recorded).activity_requests.clone()
    }

    pub fn imports(&self) -> Vec<(String, ExportPayload)> {
        lock(&self.recorded).imports.clone()
    }

    pub fn collection_patches(&self) -> Vec<(String, Value)> {
        lock(&self.recorded).collection_patches.clone()
    }

    pub fn created_collections(&self) -> Vec<Value> {
        lock(&self.recorded).created_collections.clone()
    }
}

#[async_trait]
impl Instance for MockInstance {
    fn name(&self) -> &str {
        &self.name
    }

    async fn schema_snapshot(&self) -> Result<SchemaSnapshot> {
        match &self.snapshot {
            Ok(snapshot) => Ok(snapshot.clone()),
            Err((status, message)) => Err(SyncError::Api {
                status: *status,
                code: None,
                message: message.clone(),
            }),
        }
    }

    async fn schema_diff(&self, snapshot: &SchemaSnapshot) -> Result<DiffOutcome> {
        lock(&self.recorded).diff_requests.push(snapshot.clone());
        Ok(self.diff.clone())
    }

    async fn schema_apply(&self, diff: &SchemaDiff) -> Result<()> {
        lock(&self.recorded).applied.push(diff.clone());
        match &self.apply_rejection {
            Some((code, message)) => Err(SyncError::ApplyRejected {
                code: Some(code.clone()),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn read_activities(&self, query: &ActivityQuery) -> Result<ActivityPage> {
        lock(&self.recorded).activity_requests.push(query.page);
        if self
            .fail_activities_from
            .is_some_and(|first| query.page >= first)
        {
            return Err(SyncError::Api {
                status: 503,
                code: None,
                message: "Service Unavailable".to_string(),
            });
        }
        let raw = query
            .page
            .checked_sub(1)
            .and_then(|index| self.activity_pages.get(index))
            .cloned()
            .unwrap_or_default();
        Ok(ActivityPage::from_raw(raw))
    }

    async fn import_data(&self, collection: &str, payload: &ExportPayload) -> Result<()> {
        if let Some((code, message)) = &self.import_failure {
            return Err(SyncError::Api {
                status: 400,
                code: Some(code.clone()),
                message: message.clone(),
            });
        }
        lock(&self.recorded)
            .imports
            .push((collection.to_string(), payload.clone()));
        Ok(())
    }

    async fn update_collection(&self, collection: &str, patch: &Value) -> Result<Collection> {
        lock(&self.recorded)
            .collection_patches
            .push((collection.to_string(), patch.clone()));
        Ok(Collection::new(collection))
    }

    async fn read_collections(&self) -> Result<Vec<Collection>> {
        Ok(lock(&self.recorded).collections.clone())
    }

    async fn create_collection(&self, definition: &Value) -> Result<Collection> {
        let name = definition
            .get("collection")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::Decode("collection definition has no name".to_string()))?;
        let created = Collection::new(name);
        let mut recorded = lock(&self.recorded);
        recorded.created_collections.push(definition.clone());
        recorded.collections.push(created.clone());
        Ok(created)
    }

    async fn read_items(&self, collection: &str) -> Result<Vec<Value>> {
        Ok(self.items.get(collection).cloned().unwrap_or_default())
    }

    async fn read_folders(&self) -> Result<Vec<FolderRaw>> {
        Ok(self.folders.clone())
    }

    async fn export_collection(&self, collection: &str) -> Result<ExportPayload> {
        self.exports
            .get(collection)
            .cloned()
            .ok_or_else(|| SyncError::Api {
                status: 403,
                code: Some("FORBIDDEN".to_string()),
                message: format!("You don't have permission to access collection \"{}\"", collection),
            })
    }
}
