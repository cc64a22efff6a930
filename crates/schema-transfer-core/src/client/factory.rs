//! Instance factory
//!
//! Creates authenticated instance handles from configuration records.

use schema_transfer_config::{InstanceRecord, SyncSettings};
use std::sync::Arc;
use std::time::Duration;

use super::{public_url_from_admin, DirectusClient, Instance};
use crate::error::{Result, SyncError};

/// Build an authenticated client for `record`.
///
/// The record's URL may point anywhere inside the admin app; requests go to
/// the instance root. A static token wins over a password login.
pub async fn create_instance(
    record: &InstanceRecord,
    settings: &SyncSettings,
) -> Result<Arc<dyn Instance>> {
    let client = DirectusClient::new(
        record.display_name(),
        public_url_from_admin(&record.url),
        Duration::from_secs(settings.request_timeout_secs),
    )?;

    if let Some(token) = &record.static_token {
        return Ok(Arc::new(client.with_token(token.clone())));
    }

    let email = record
        .email
        .as_deref()
        .ok_or_else(|| missing_credential(record, "email"))?;
    let password = record
        .resolved_password()
        .ok_or_else(|| missing_credential(record, "password"))?;

    let client = client.login(email, &password).await?;
    Ok(Arc::new(client))
}

fn missing_credential(record: &InstanceRecord, what: &str) -> SyncError {
    SyncError::Config(format!(
        "instance '{}' has no static_token and no {}",
        record.id, what
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> InstanceRecord {
        InstanceRecord {
            id: "prod".to_string(),
            name: Some("Production".to_string()),
            url: "http://localhost:8056".to_string(),
            email: None,
            password: None,
            password_env: None,
            static_token: None,
            current: false,
        }
    }

    #[tokio::test]
    async fn static_token_skips_login() {
        let mut record = record();
        record.static_token = Some("token".to_string());
        let instance = create_instance(&record, &SyncSettings::default())
            .await
            .unwrap();
        assert_eq!(instance.name(), "Production");
    }

    #[tokio::test]
    async fn missing_credentials_is_config_error() {
        let result = create_instance(&record(), &SyncSettings::default()).await;
        assert!(matches!(result, Err(SyncError::Config(msg)) if msg.contains("email")));
    }
}
