//! Configuration loading for schema-transfer.
//!
//! Configuration is read from a TOML file. The location is resolved in this order:
//! 1. An explicit path (the `--config` flag)
//! 2. The `SCHEMA_TRANSFER_CONFIG` environment variable
//! 3. `<platform config dir>/schema-transfer/config.toml`

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that points at a configuration file
pub const CONFIG_ENV_VAR: &str = "SCHEMA_TRANSFER_CONFIG";

/// Activities requested per page by default
pub const DEFAULT_ACTIVITIES_PER_REQUEST: usize = 2000;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Validation failures for a loaded configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no instances configured")]
    NoInstances,
    #[error("duplicate instance id '{0}'")]
    DuplicateInstance(String),
    #[error("instance '{0}' has an empty url")]
    EmptyUrl(String),
    #[error("more than one instance is flagged as current: {0:?}")]
    MultipleCurrent(Vec<String>),
    #[error("activities_per_request must be greater than zero")]
    ZeroPageSize,
}

/// One backend instance the operator can synchronize with.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable whose value replaces `password` when set
    #[serde(default)]
    pub password_env: Option<String>,
    /// Pre-issued token used instead of a password login
    #[serde(default)]
    pub static_token: Option<String>,
    /// Marks the local (master) instance
    #[serde(default)]
    pub current: bool,
}

impl fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .field("static_token", &self.static_token.as_ref().map(|_| "<redacted>"))
            .field("current", &self.current)
            .finish()
    }
}

impl InstanceRecord {
    /// Human readable label, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Password to log in with, preferring the environment override
    pub fn resolved_password(&self) -> Option<String> {
        self.password_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| self.password.clone())
    }
}

/// Tunables for the sync pipeline and the HTTP client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    pub activities_per_request: usize,
    pub request_timeout_secs: u64,
    /// Patch `meta.imported_at` on the target collection after an import
    pub stamp_imported_at: bool,
    /// Collections protected from schema sync in addition to the built-in set
    pub extra_protected_collections: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            activities_per_request: DEFAULT_ACTIVITIES_PER_REQUEST,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stamp_imported_at: true,
            extra_protected_collections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl AppConfig {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "schema-transfer")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Resolve the configuration path from an explicit path, the environment, or the default
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Ok(PathBuf::from(path));
        }
        Self::default_path().context("Could not determine a configuration directory")
    }

    /// Load and validate the configuration
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit)?;
        Self::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        tracing::debug!(
            "Loaded {} instance(s) from {}",
            config.instances.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instances.is_empty() {
            return Err(ConfigError::NoInstances);
        }

        let mut seen = HashSet::new();
        for record in &self.instances {
            if !seen.insert(record.id.as_str()) {
                return Err(ConfigError::DuplicateInstance(record.id.clone()));
            }
            if record.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(record.id.clone()));
            }
        }

        let current: Vec<String> = self
            .instances
            .iter()
            .filter(|r| r.current)
            .map(|r| r.id.clone())
            .collect();
        if current.len() > 1 {
            return Err(ConfigError::MultipleCurrent(current));
        }

        if self.sync.activities_per_request == 0 {
            return Err(ConfigError::ZeroPageSize);
        }

        Ok(())
    }

    pub fn instance(&self, id: &str) -> Option<&InstanceRecord> {
        self.instances.iter().find(|r| r.id == id)
    }

    /// The local instance: the one flagged `current`, else the first one.
    pub fn master(&self) -> Option<&InstanceRecord> {
        self.instances
            .iter()
            .find(|r| r.current)
            .or_else(|| self.instances.first())
    }

    /// Every instance except the master
    pub fn remotes(&self) -> impl Iterator<Item = &InstanceRecord> {
        let master_id = self.master().map(|m| m.id.clone());
        self.instances
            .iter()
            .filter(move |r| Some(&r.id) != master_id.as_ref())
    }

    /// The remote instance: the preferred one when it names a non-master record,
    /// otherwise the first non-master record.
    pub fn remote(&self, preferred: Option<&str>) -> Option<&InstanceRecord> {
        if let Some(id) = preferred {
            if let Some(record) = self.remotes().find(|r| r.id == id) {
                return Some(record);
            }
            tracing::warn!("Preferred remote instance '{}' is not available", id);
        }
        self.remotes().next()
    }
}
