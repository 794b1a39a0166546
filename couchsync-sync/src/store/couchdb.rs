//! CouchDB store implementation.
//!
//! Talks to the CouchDB HTTP API: one database, documents addressed by
//! `{base_url}/{database}/{document id}`.

use super::{DocumentStore, StoreError, StoreResult, StoredDocument};
use async_trait::async_trait;
use couchsync_model::FlatDocument;
use couchsync_types::{DocumentRef, Revision};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// CouchDB connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CouchDbConfig {
    /// Server URL (e.g. `http://127.0.0.1:5984`).
    pub base_url: String,
    /// Target database name.
    pub database: String,
    /// Basic auth user. No auth header is sent when unset.
    pub username: Option<String>,
    /// Basic auth password, used with `username`.
    pub password: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CouchDbConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5984".to_string(),
            database: "couchsync".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

/// Body of a successful CouchDB write.
#[derive(Debug, Deserialize)]
struct WriteResponse {
    rev: String,
}

/// Body of a CouchDB error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    reason: String,
}

impl ErrorResponse {
    /// CouchDB 2+ says "Database does not exist."; 1.x said "no_db_file".
    fn is_missing_database(&self) -> bool {
        self.error == "not_found"
            && (self.reason.starts_with("Database does not exist") || self.reason == "no_db_file")
    }
}

/// CouchDB-backed [`DocumentStore`].
pub struct CouchDbStore {
    config: CouchDbConfig,
    client: Client,
}

impl CouchDbStore {
    /// Creates a new CouchDB client.
    pub fn new(config: CouchDbConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Connection settings this client was built with.
    pub fn config(&self) -> &CouchDbConfig {
        &self.config
    }

    fn database_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.database)
        )
    }

    fn document_url(&self, doc_id: &str) -> String {
        format!("{}/{}", self.database_url(), urlencoding::encode(doc_id))
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder, operation: &str, doc_id: &str) -> StoreResult<Response> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::Transient(format!("{operation} {doc_id} failed: {e}")))
    }

    /// Reads the body of a write response for its new revision.
    async fn written_revision(response: Response, doc_id: &str) -> StoreResult<Revision> {
        let body: WriteResponse = response.json().await.map_err(|e| {
            StoreError::Transient(format!("failed to read write response for {doc_id}: {e}"))
        })?;
        Ok(Revision::new(body.rev))
    }

    /// Maps a non-success response onto the error taxonomy.
    async fn status_error(response: Response, doc_id: &str) -> StoreError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorResponse>(&text).ok();
        let missing_database = body.as_ref().is_some_and(ErrorResponse::is_missing_database);
        let reason = match body {
            Some(body) if body.reason.is_empty() => body.error,
            Some(body) => format!("{}: {}", body.error, body.reason),
            None => text,
        };

        match status {
            // A missing database says nothing about the document.
            StatusCode::NOT_FOUND if missing_database => StoreError::Rejected {
                status: status.as_u16(),
                reason,
            },
            StatusCode::NOT_FOUND => StoreError::NotFound(doc_id.to_string()),
            StatusCode::CONFLICT => StoreError::RevisionConflict(doc_id.to_string()),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                StoreError::Transient(format!("{doc_id}: {status} {reason}"))
            }
            s if s.is_server_error() => StoreError::Transient(format!("{doc_id}: {status} {reason}")),
            s => StoreError::Rejected {
                status: s.as_u16(),
                reason,
            },
        }
    }

    async fn put_document(
        &self,
        doc_id: &str,
        body: Map<String, Value>,
        operation: &str,
    ) -> StoreResult<Revision> {
        let request = self
            .request(Method::PUT, self.document_url(doc_id))
            .json(&body);
        let response = Self::send(request, operation, doc_id).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, doc_id).await);
        }
        let revision = Self::written_revision(response, doc_id).await?;
        debug!(doc_id, revision = %revision, operation, "Wrote document");
        Ok(revision)
    }
}

#[async_trait]
impl DocumentStore for CouchDbStore {
    fn backend_name(&self) -> &'static str {
        "couchdb"
    }

    async fn ensure_database(&self) -> StoreResult<()> {
        let database = &self.config.database;
        let request = self.request(Method::PUT, self.database_url());
        let response = Self::send(request, "create database", database).await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                info!(database = %database, "Created CouchDB database");
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED => {
                debug!(database = %database, "CouchDB database already exists");
                Ok(())
            }
            _ => Err(Self::status_error(response, database).await),
        }
    }

    async fn get(&self, doc_ref: &DocumentRef) -> StoreResult<StoredDocument> {
        let doc_id = doc_ref.document_id();
        let request = self.request(Method::GET, self.document_url(&doc_id));
        let response = Self::send(request, "get", &doc_id).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, &doc_id).await);
        }

        let mut body: Map<String, Value> = response.json().await.map_err(|e| {
            StoreError::Transient(format!("failed to read document {doc_id}: {e}"))
        })?;
        let revision = match body.remove("_rev") {
            Some(Value::String(rev)) => Revision::new(rev),
            _ => {
                return Err(StoreError::Rejected {
                    status: StatusCode::OK.as_u16(),
                    reason: format!("document {doc_id} has no _rev"),
                });
            }
        };
        // CouchDB metadata (_id, _attachments, ...) is not part of the document.
        body.retain(|key, _| !key.starts_with('_'));

        let document = FlatDocument::from_json(body)?;
        debug!(doc_id = %doc_id, revision = %revision, "Fetched document");
        Ok(StoredDocument { document, revision })
    }

    async fn create(&self, doc_ref: &DocumentRef, document: &FlatDocument) -> StoreResult<Revision> {
        let doc_id = doc_ref.document_id();
        let body = document.to_json()?;
        self.put_document(&doc_id, body, "create").await
    }

    async fn update(
        &self,
        doc_ref: &DocumentRef,
        document: &FlatDocument,
        expected: &Revision,
    ) -> StoreResult<Revision> {
        let doc_id = doc_ref.document_id();
        let mut body = document.to_json()?;
        body.insert("_rev".to_string(), Value::String(expected.to_string()));
        self.put_document(&doc_id, body, "update").await
    }

    async fn delete(&self, doc_ref: &DocumentRef, expected: &Revision) -> StoreResult<()> {
        let doc_id = doc_ref.document_id();
        let request = self
            .request(Method::DELETE, self.document_url(&doc_id))
            .query(&[("rev", expected.as_str())]);
        let response = Self::send(request, "delete", &doc_id).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, &doc_id).await);
        }
        debug!(doc_id = %doc_id, revision = %expected, "Deleted document");
        Ok(())
    }
}
