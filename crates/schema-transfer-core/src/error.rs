//! Error taxonomy for the sync core.

use serde::Deserialize;
use thiserror::Error;

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The instance could not be reached or the request could not be sent
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The instance answered with a non-success status
    #[error("{}", api_message(*status, code.as_deref(), message))]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Apply was requested but the target reported no schema drift
    #[error("target schema already matches the snapshot; nothing to apply")]
    NotApplicable,

    /// The target refused the filtered diff
    #[error("schema apply rejected ({}): {message}", code.as_deref().unwrap_or("unknown"))]
    ApplyRejected {
        code: Option<String>,
        message: String,
    },

    #[error("import into '{collection}' failed ({}): {message}", code.as_deref().unwrap_or("unknown"))]
    Import {
        collection: String,
        code: Option<String>,
        message: String,
    },

    #[error("authentication failed for {instance}: {message}")]
    Auth { instance: String, message: String },

    #[error("unexpected payload: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn api_message(status: u16, code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("backend error {} ({}): {}", status, code, message),
        None => format!("backend error {}: {}", status, message),
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl SyncError {
    /// Error code reported by the backend, if any
    pub fn code(&self) -> Option<&str> {
        match self {
            SyncError::Api { code, .. }
            | SyncError::ApplyRejected { code, .. }
            | SyncError::Import { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Build an [`SyncError::Api`] from a status and the raw response body.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let (code, message) = ErrorBody::extract(body);
        SyncError::Api {
            status,
            code,
            message,
        }
    }
}

/// Backend error envelope: `{"errors": [{"message": "...", "extensions": {"code": "..."}}]}`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorEntry {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

impl ErrorBody {
    /// Best-effort extraction of the first error's code and message.
    ///
    /// Bodies that are not an error envelope produce no code and the raw text.
    pub fn extract(body: &str) -> (Option<String>, String) {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        match parsed.errors.into_iter().next() {
            Some(entry) => {
                let code = entry.extensions.and_then(|e| e.code);
                let message = entry.message.unwrap_or_else(|| body.trim().to_string());
                (code, message)
            }
            None => (None, body.trim().to_string()),
        }
    }
}
