//! reqwest-backed [`Instance`] for Directus-compatible REST APIs.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::endpoint::{collection_endpoint, join};
use super::Instance;
use crate::activity::{ActivityPage, ActivityQuery};
use crate::error::{ErrorBody, Result, SyncError};
use crate::model::{
    normalize_records, Collection, DiffOutcome, FolderRaw, SchemaDiff, SchemaSnapshot,
};
use crate::transfer::ExportPayload;

/// Response envelope: every payload is wrapped in `{"data": ...}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    access_token: String,
}

#[derive(Clone)]
pub struct DirectusClient {
    name: String,
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl fmt::Debug for DirectusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectusClient")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl DirectusClient {
    /// Create an unauthenticated client
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    /// Use a pre-issued token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Exchange credentials for an access token
    pub async fn login(mut self, email: &str, password: &str) -> Result<Self> {
        debug!("Logging in to {} at {}", self.name, self.base_url);
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (_, message) = ErrorBody::extract(&body);
            return Err(SyncError::Auth {
                instance: self.name.clone(),
                message: format!("{} ({})", message, status),
            });
        }

        let login: Envelope<LoginData> = response.json().await?;
        self.token = Some(login.data.access_token);
        info!("Authenticated against {}", self.name);
        Ok(self)
    }

    fn url(&self, path: &str) -> String {
        join(&self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Public export URL of a collection, authenticated through the query string
    pub fn export_url(&self, collection: &str) -> Result<Url> {
        let token = self.token.as_deref().ok_or_else(|| SyncError::Auth {
            instance: self.name.clone(),
            message: "export requires an access token".to_string(),
        })?;
        let endpoint = self.url(&collection_endpoint(collection));
        Url::parse_with_params(
            &endpoint,
            &[("access_token", token), ("limit", "-1"), ("export", "json")],
        )
        .map_err(|e| SyncError::Config(format!("invalid export url {}: {}", endpoint, e)))
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::from_response_body(status.as_u16(), &body))
    }

    async fn data<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = Self::check(request.send().await?).await?;
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl Instance for DirectusClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn schema_snapshot(&self) -> Result<SchemaSnapshot> {
        let request = self.authorized(self.client.get(self.url("/schema/snapshot")));
        let snapshot: SchemaSnapshot = Self::data(request).await?;
        debug!(
            "Snapshot from {}: {} collection(s), {} field(s), {} relation(s)",
            self.name,
            snapshot.collections.len(),
            snapshot.fields.len(),
            snapshot.relations.len()
        );
        Ok(snapshot)
    }

    async fn schema_diff(&self, snapshot: &SchemaSnapshot) -> Result<DiffOutcome> {
        let request = self
            .authorized(self.client.post(self.url("/schema/diff")))
            .json(snapshot);
        let response = Self::check(request.send().await?).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(DiffOutcome::NoChanges);
        }

        let envelope: Envelope<Option<SchemaDiff>> = response.json().await?;
        Ok(match envelope.data {
            Some(diff) => DiffOutcome::Changes(diff),
            None => DiffOutcome::NoChanges,
        })
    }

    async fn schema_apply(&self, diff: &SchemaDiff) -> Result<()> {
        let request = self
            .authorized(self.client.post(self.url("/schema/apply")))
            .json(diff);
        match Self::check(request.send().await?).await {
            Ok(_) => Ok(()),
            Err(SyncError::Api { code, message, .. }) => {
                Err(SyncError::ApplyRejected { code, message })
            }
            Err(other) => Err(other),
        }
    }

    async fn read_activities(&self, query: &ActivityQuery) -> Result<ActivityPage> {
        let request = self
            .authorized(self.client.get(self.url("/activity")))
            .query(&query.to_query_pairs());
        let raw: Vec<Value> = Self::data(request).await?;
        Ok(ActivityPage::from_raw(raw))
    }

    async fn import_data(&self, collection: &str, payload: &ExportPayload) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(payload.bytes.clone())
            .file_name(payload.file_name.clone())
            .mime_str(ExportPayload::CONTENT_TYPE)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .authorized(self.client.post(self.url(&format!("/utils/import/{}", collection))))
            .multipart(form);
        Self::check(request.send().await?).await?;
        Ok(())
    }

    async fn update_collection(&self, collection: &str, patch: &Value) -> Result<Collection> {
        let request = self
            .authorized(self.client.patch(self.url(&format!("/collections/{}", collection))))
            .json(patch);
        Self::data(request).await
    }

    async fn read_collections(&self) -> Result<Vec<Collection>> {
        let request = self.authorized(self.client.get(self.url("/collections")));
        let raw: Vec<Value> = Self::data(request).await?;
        Ok(normalize_records(raw))
    }

    async fn create_collection(&self, definition: &Value) -> Result<Collection> {
        let request = self
            .authorized(self.client.post(self.url("/collections")))
            .json(definition);
        Self::data(request).await
    }

    async fn read_items(&self, collection: &str) -> Result<Vec<Value>> {
        let request = self
            .authorized(self.client.get(self.url(&collection_endpoint(collection))))
            .query(&[("limit", "-1")]);
        Self::data(request).await
    }

    async fn read_folders(&self) -> Result<Vec<FolderRaw>> {
        let request = self
            .authorized(self.client.get(self.url("/folders")))
            .query(&[("limit", "-1"), ("fields", "id,name,parent")]);
        Self::data(request).await
    }

    async fn export_collection(&self, collection: &str) -> Result<ExportPayload> {
        let url = self.export_url(collection)?;
        debug!("Exporting '{}' from {}", collection, self.name);
        let response = Self::check(self.client.get(url).send().await?).await?;
        let bytes = response.bytes().await?;

        // Some deployments return the array wrapped in the usual envelope
        let payload = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(mut object)) if object.contains_key("data") => {
                let data = object.remove("data").unwrap_or_else(|| json!([]));
                ExportPayload::from_json(collection, &data)?
            }
            _ => ExportPayload::from_bytes(collection, bytes.to_vec()),
        };
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityAggregator, ActivityIndex};
    use axum::extract::Query;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;

    fn client() -> DirectusClient {
        DirectusClient::new("stage", "http://localhost:8055/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn trims_trailing_slash() {
        let client = client();
        assert_eq!(client.base_url(), "http://localhost:8055");
        assert_eq!(client.url("/schema/snapshot"), "http://localhost:8055/schema/snapshot");
    }

    #[test]
    fn export_url_carries_token_and_params() {
        let client = client().with_token("abc");
        let url = client.export_url("articles").unwrap();
        assert_eq!(url.path(), "/items/articles");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("access_token".to_string(), "abc".to_string()),
                ("limit".to_string(), "-1".to_string()),
                ("export".to_string(), "json".to_string()),
            ]
        );

        let system = client.export_url("directus_users").unwrap();
        assert_eq!(system.path(), "/users");
    }

    #[test]
    fn export_url_requires_token() {
        assert!(matches!(
            client().export_url("articles"),
            Err(SyncError::Auth { .. })
        ));
    }

    #[test]
    fn debug_hides_token() {
        let rendered = format!("{:?}", client().with_token("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }

    async fn serve(router: Router) -> DirectusClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        DirectusClient::new("target", format!("http://{}", addr), Duration::from_secs(5))
            .unwrap()
            .with_token("token")
    }

    fn diff_route(handler: axum::routing::MethodRouter) -> Router {
        Router::new().route("/schema/diff", handler)
    }

    #[tokio::test]
    async fn diff_no_content_means_no_changes() {
        let client = serve(diff_route(post(|| async { StatusCode::NO_CONTENT }))).await;

        let outcome = client.schema_diff(&SchemaSnapshot::empty()).await.unwrap();

        assert_eq!(outcome, DiffOutcome::NoChanges);
        assert!(!outcome.can_apply());
    }

    #[tokio::test]
    async fn diff_null_data_means_no_changes() {
        let client = serve(diff_route(post(|| async { Json(json!({"data": null})) }))).await;

        let outcome = client.schema_diff(&SchemaSnapshot::empty()).await.unwrap();

        assert!(!outcome.can_apply());
    }

    #[tokio::test]
    async fn diff_body_is_applicable() {
        let router = diff_route(post(|Json(snapshot): Json<Value>| async move {
            // Echo the posted collection back as a change
            let name = snapshot["collections"][0]["collection"].clone();
            Json(json!({
                "data": {
                    "hash": "h1",
                    "diff": {"collections": [{"collection": name, "diff": [{"kind": "N"}]}]}
                }
            }))
        }));
        let client = serve(router).await;
        let snapshot: SchemaSnapshot = serde_json::from_value(json!({
            "version": 1,
            "collections": [{"collection": "posts", "meta": {"export_schema": {"export": true}}}]
        }))
        .unwrap();

        let outcome = client.schema_diff(&snapshot).await.unwrap();

        assert!(outcome.can_apply());
        let diff = outcome.diff().unwrap();
        assert_eq!(diff.hash.as_deref(), Some("h1"));
        assert_eq!(diff.collections(), vec!["posts"]);
    }

    #[tokio::test]
    async fn diff_error_status_is_an_api_error() {
        let router = diff_route(post(|| async {
            (
                StatusCode::FORBIDDEN,
                Json(json!({"errors": [{"message": "Forbidden", "extensions": {"code": "FORBIDDEN"}}]})),
            )
        }));
        let client = serve(router).await;

        let err = client.schema_diff(&SchemaSnapshot::empty()).await.unwrap_err();

        assert!(matches!(err, SyncError::Api { status: 403, .. }));
        assert_eq!(err.code(), Some("FORBIDDEN"));
    }

    #[tokio::test]
    async fn rejected_apply_keeps_backend_code() {
        let router = Router::new().route(
            "/schema/apply",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "errors": [{
                            "message": "Provided hash does not match the current instance's schema hash",
                            "extensions": {"code": "INVALID_PAYLOAD"}
                        }]
                    })),
                )
            }),
        );
        let client = serve(router).await;

        let err = client.schema_apply(&SchemaDiff::new("stale")).await.unwrap_err();

        assert!(matches!(err, SyncError::ApplyRejected { .. }));
        assert_eq!(err.code(), Some("INVALID_PAYLOAD"));
    }

    #[tokio::test]
    async fn accepted_apply_succeeds() {
        let router = Router::new().route("/schema/apply", post(|| async { StatusCode::NO_CONTENT }));
        let client = serve(router).await;

        client.schema_apply(&SchemaDiff::new("h1")).await.unwrap();
    }

    #[tokio::test]
    async fn snapshot_is_read_without_loss() {
        let router = Router::new().route(
            "/schema/snapshot",
            get(|| async {
                Json(json!({
                    "data": {
                        "version": 1,
                        "collections": [
                            {"collection": "posts", "meta": {"export_schema": {"export": true}}},
                            {"collection": "tags", "meta": {"system": "maybe"}}
                        ],
                        "fields": null,
                        "relations": []
                    }
                }))
            }),
        );
        let client = serve(router).await;

        let snapshot = client.schema_snapshot().await.unwrap();

        assert_eq!(snapshot.collections.len(), 2);
        assert!(snapshot.fields.is_empty());
    }

    fn activity(collection: Value, item: u32) -> Value {
        json!({
            "collection": collection,
            "item": item,
            "timestamp": format!("2024-01-0{}T00:00:00Z", item),
            "action": "update"
        })
    }

    #[tokio::test]
    async fn activity_paging_counts_undecodable_records() {
        let router = Router::new().route(
            "/activity",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let page = match params.get("page").map(String::as_str) {
                    Some("1") => vec![
                        activity(json!("posts"), 1),
                        activity(json!("posts"), 2),
                        activity(Value::Null, 3),
                        activity(json!("tags"), 4),
                    ],
                    Some("2") => vec![activity(json!("posts"), 5), activity(json!("tags"), 6)],
                    _ => Vec::new(),
                };
                Json(json!({ "data": page }))
            }),
        );
        let client = serve(router).await;

        let first = client.read_activities(&ActivityQuery::page(4, 1)).await.unwrap();
        assert_eq!(first.received, 4);
        assert_eq!(first.skipped(), 1);

        let index = ActivityAggregator::new(4)
            .collect(&client, |page| ActivityQuery::page(4, page), ActivityIndex::new())
            .await
            .unwrap();
        assert_eq!(index.len(), 5);
    }
}
