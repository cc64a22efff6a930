//! Operator preferences that survive between runs.
//!
//! Only the selected remote instance is stored. The value is opaque to the
//! sync core; it is resolved against the instance list by [`AppConfig::remote`].
//!
//! [`AppConfig::remote`]: crate::config::AppConfig::remote

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_instance: Option<String>,
}

/// File-backed preference store
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory
    pub fn default_location() -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "schema-transfer")
            .context("Could not determine a data directory")?;
        Ok(Self::new(dirs.data_dir().join("preferences.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read preferences; a missing file yields the defaults.
    pub fn load(&self) -> Result<Preferences> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read preferences: {}", self.path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid preferences file: {}", self.path.display()))
    }

    pub fn save(&self, preferences: &Preferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preferences dir: {}", parent.display())
            })?;
        }
        let content = toml::to_string(preferences).context("Failed to serialize preferences")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write preferences: {}", self.path.display()))?;
        tracing::debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }

    pub fn remote_instance(&self) -> Result<Option<String>> {
        Ok(self.load()?.remote_instance)
    }

    pub fn set_remote_instance(&self, id: &str) -> Result<()> {
        let mut preferences = self.load()?;
        preferences.remote_instance = Some(id.to_string());
        self.save(&preferences)
    }
}
