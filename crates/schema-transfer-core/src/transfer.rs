//! Collection data export and import between instances.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::client::Instance;
use crate::error::{Result, SyncError};
use crate::redact::redact_value;

/// Serialized collection data, usable both as a file and as parsed JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    pub collection: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportPayload {
    pub const CONTENT_TYPE: &'static str = "application/json";

    pub fn from_bytes(collection: impl Into<String>, bytes: Vec<u8>) -> Self {
        let collection = collection.into();
        Self {
            file_name: format!("{}.json", collection),
            collection,
            bytes,
        }
    }

    pub fn from_json(collection: impl Into<String>, value: &Value) -> Result<Self> {
        Ok(Self::from_bytes(collection, serde_json::to_vec(value)?))
    }

    /// Parse the payload as JSON
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }

    /// Number of records when the payload is a JSON array
    pub fn record_count(&self) -> Option<usize> {
        self.json().ok()?.as_array().map(Vec::len)
    }

    /// A copy with the given fields cleared in every record
    pub fn redacted<S: AsRef<str>>(&self, field_names: &[S]) -> Result<Self> {
        let value = redact_value(&self.json()?, field_names);
        let mut copy = Self::from_json(self.collection.clone(), &value)?;
        copy.file_name = self.file_name.clone();
        Ok(copy)
    }

    /// Write the payload as `<dir>/<file_name>`
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        debug!("Wrote {} byte(s) to {}", self.bytes.len(), path.display());
        Ok(path)
    }
}

/// Outcome of a successful import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub collection: String,
    pub bytes: usize,
    /// `meta.imported_at` written to the target, if stamping was enabled
    pub imported_at: Option<String>,
}

/// Export/import driver.
///
/// Tracks whether an upload is in flight; the flag is cleared however the
/// upload ends.
#[derive(Debug)]
pub struct Transfer {
    stamp_imported_at: bool,
    uploading: AtomicBool,
}

struct UploadGuard<'a>(&'a AtomicBool);

impl<'a> UploadGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Transfer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Transfer {
    pub fn new(stamp_imported_at: bool) -> Self {
        Self {
            stamp_imported_at,
            uploading: AtomicBool::new(false),
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    pub async fn export_collection(
        &self,
        source: &dyn Instance,
        collection: &str,
    ) -> Result<ExportPayload> {
        let payload = source.export_collection(collection).await?;
        info!(
            "Exported '{}' from {} ({} byte(s))",
            collection,
            source.name(),
            payload.bytes.len()
        );
        Ok(payload)
    }

    /// Upload `payload` into `collection` on `target`, then stamp
    /// `meta.imported_at` when enabled.
    pub async fn import_collection(
        &self,
        collection: &str,
        payload: &ExportPayload,
        target: &dyn Instance,
    ) -> Result<ImportReport> {
        {
            let _guard = UploadGuard::raise(&self.uploading);
            target
                .import_data(collection, payload)
                .await
                .map_err(|e| import_error(collection, e))?;
        }
        info!("Imported '{}' into {}", collection, target.name());

        let imported_at = if self.stamp_imported_at {
            let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            target
                .update_collection(collection, &json!({ "meta": { "imported_at": now } }))
                .await?;
            debug!("Stamped '{}' on {} with imported_at={}", collection, target.name(), now);
            Some(now)
        } else {
            None
        };

        Ok(ImportReport {
            collection: collection.to_string(),
            bytes: payload.bytes.len(),
            imported_at,
        })
    }

    /// Export from `source`, clear `redact_fields`, import into `target`.
    pub async fn transfer<S: AsRef<str>>(
        &self,
        source: &dyn Instance,
        target: &dyn Instance,
        collection: &str,
        redact_fields: &[S],
    ) -> Result<ImportReport> {
        let exported = self.export_collection(source, collection).await?;
        let payload = if redact_fields.is_empty() {
            exported
        } else {
            exported.redacted(redact_fields)?
        };
        self.import_collection(collection, &payload, target).await
    }
}

fn import_error(collection: &str, err: SyncError) -> SyncError {
    match err {
        SyncError::Api { code, message, .. } => {
            warn!("Import into '{}' failed: {}", collection, message);
            SyncError::Import {
                collection: collection.to_string(),
                code,
                message,
            }
        }
        other => other,
    }
}
