//! Loaded configuration plus instance resolution shared by every command.

use anyhow::{bail, Context as _, Result};
use futures::future::try_join;
use schema_transfer_config::{AppConfig, InstanceRecord, PreferenceStore};
use schema_transfer_core::{create_instance, ExclusionSet, Instance};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct Context {
    pub config: AppConfig,
    pub preferences: PreferenceStore,
    remote_override: Option<String>,
}

impl Context {
    pub fn load(config_path: Option<&Path>, remote_override: Option<String>) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        let preferences = PreferenceStore::default_location()?;
        Ok(Self::new(config, preferences, remote_override))
    }

    pub fn new(
        config: AppConfig,
        preferences: PreferenceStore,
        remote_override: Option<String>,
    ) -> Self {
        Self {
            config,
            preferences,
            remote_override,
        }
    }

    pub fn master_record(&self) -> Result<&InstanceRecord> {
        self.config
            .master()
            .context("No instances configured")
    }

    /// `--remote` wins and must name a non-master instance; otherwise the
    /// stored preference, falling back to the first non-master instance.
    pub fn remote_record(&self) -> Result<&InstanceRecord> {
        if let Some(id) = &self.remote_override {
            return match self.config.remotes().find(|r| &r.id == id) {
                Some(record) => Ok(record),
                None => bail!("'{}' is not a configured remote instance", id),
            };
        }

        let preferred = self.preferences.remote_instance()?;
        self.config
            .remote(preferred.as_deref())
            .context("No remote instance configured; add a second [[instances]] entry")
    }

    pub async fn master(&self) -> Result<Arc<dyn Instance>> {
        let record = self.master_record()?;
        connect(record, self).await
    }

    /// Connect to master and remote concurrently
    pub async fn master_and_remote(&self) -> Result<(Arc<dyn Instance>, Arc<dyn Instance>)> {
        let master = self.master_record()?;
        let remote = self.remote_record()?;
        try_join(connect(master, self), connect(remote, self)).await
    }

    /// Built-in protected collections plus the configured extras
    pub fn exclusions(&self) -> ExclusionSet {
        ExclusionSet::with_additional(self.config.sync.extra_protected_collections.iter().cloned())
    }
}

async fn connect(record: &InstanceRecord, ctx: &Context) -> Result<Arc<dyn Instance>> {
    debug!("Connecting to {} ({})", record.display_name(), record.url);
    create_instance(record, &ctx.config.sync)
        .await
        .with_context(|| format!("Failed to connect to instance '{}'", record.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CONFIG: &str = r#"
        [[instances]]
        id = "local"
        url = "http://localhost:8055"
        current = true

        [[instances]]
        id = "staging"
        url = "https://staging.example.com"

        [[instances]]
        id = "prod"
        url = "https://example.com"

        [sync]
        extra_protected_collections = ["audit_log"]
    "#;

    fn context(remote_override: Option<&str>) -> (tempfile::TempDir, Context) {
        let dir = tempdir().expect("tempdir");
        let store = PreferenceStore::new(dir.path().join("preferences.toml"));
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let ctx = Context::new(config, store, remote_override.map(str::to_string));
        (dir, ctx)
    }

    #[test]
    fn remote_defaults_to_first_non_master() {
        let (_dir, ctx) = context(None);
        assert_eq!(ctx.master_record().unwrap().id, "local");
        assert_eq!(ctx.remote_record().unwrap().id, "staging");
    }

    #[test]
    fn stored_preference_selects_remote() {
        let (_dir, ctx) = context(None);
        ctx.preferences.set_remote_instance("prod").unwrap();
        assert_eq!(ctx.remote_record().unwrap().id, "prod");
    }

    #[test]
    fn override_must_name_a_remote() {
        let (_dir, ctx) = context(Some("prod"));
        assert_eq!(ctx.remote_record().unwrap().id, "prod");

        let (_dir, ctx) = context(Some("local"));
        assert!(ctx.remote_record().is_err());
    }

    #[test]
    fn configured_collections_are_protected() {
        let (_dir, ctx) = context(None);
        let exclusions = ctx.exclusions();
        assert!(exclusions.is_excluded("audit_log"));
        assert!(exclusions.is_excluded(schema_transfer_core::schema::BOOKKEEPING_COLLECTION));
    }
}
