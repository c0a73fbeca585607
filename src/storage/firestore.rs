//! Cloud Firestore backend over the REST v1 API.
//!
//! Documents live under
//! `{base_url}/v1/projects/{project}/databases/{database}/documents`.
//! Listing uses a plain collection GET, field equality runs a `structuredQuery`
//! through `:runQuery`, and upserts PATCH the full field set at the document key.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use super::value::{decode_fields, encode_fields, FieldValue};
use super::{Document, DocumentFields, DocumentRef, DocumentStore, Fields, StoreError, StoreResult};

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";
pub const DEFAULT_DATABASE: &str = "(default)";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// How requests to Firestore are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum FirestoreCredentials {
    /// No `Authorization` header. Only emulators accept this.
    Anonymous,
    /// A fixed OAuth2 access token. It is not refreshed.
    Token(String),
    /// Service-account key file; access tokens are minted from it and refreshed before expiry.
    ServiceAccount(PathBuf),
}

impl fmt::Debug for FirestoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirestoreCredentials::Anonymous => f.write_str("Anonymous"),
            FirestoreCredentials::Token(_) => f.write_str("Token(<redacted>)"),
            FirestoreCredentials::ServiceAccount(path) => f.debug_tuple("ServiceAccount").field(path).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    pub credentials: FirestoreCredentials,
    pub timeout: Duration,
}

enum Authorizer {
    Anonymous,
    Token(String),
    Minted(Arc<dyn TokenProvider>),
}

pub struct FirestoreStore {
    client: Client,
    documents_root: String,
    auth: Authorizer,
}

impl FirestoreStore {
    pub fn new(cfg: &FirestoreConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("building http client: {e}")))?;
        let documents_root = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            cfg.base_url.trim_end_matches('/'),
            cfg.project_id,
            cfg.database
        );
        let auth = match &cfg.credentials {
            FirestoreCredentials::Anonymous => Authorizer::Anonymous,
            FirestoreCredentials::Token(token) => Authorizer::Token(token.clone()),
            FirestoreCredentials::ServiceAccount(path) => {
                let account = CustomServiceAccount::from_file(path).map_err(|e| {
                    StoreError::Credentials(format!("loading service account {}: {e}", path.display()))
                })?;
                Authorizer::Minted(Arc::new(account))
            }
        };
        Ok(Self { client, documents_root, auth })
    }

    async fn authorize(&self, req: RequestBuilder) -> StoreResult<RequestBuilder> {
        match &self.auth {
            Authorizer::Anonymous => Ok(req),
            Authorizer::Token(token) => Ok(req.bearer_auth(token)),
            // the provider caches the token and only goes back to the token endpoint near expiry
            Authorizer::Minted(provider) => {
                let token = provider
                    .token(&[DATASTORE_SCOPE])
                    .await
                    .map_err(|e| StoreError::Credentials(e.to_string()))?;
                Ok(req.bearer_auth(token.as_str()))
            }
        }
    }

    async fn send_json(&self, req: RequestBuilder) -> StoreResult<JsonValue> {
        let resp = self
            .authorize(req)
            .await?
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status { status: status.as_u16(), body });
        }
        resp.json::<JsonValue>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Document key is the last segment of the resource name.
fn document_id(doc: &JsonValue) -> StoreResult<String> {
    let name = doc
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| StoreError::Decode("document without name".to_string()))?;
    name.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
        .ok_or_else(|| StoreError::Decode(format!("bad document name {name:?}")))
}

fn decode_document(doc: &JsonValue) -> StoreResult<Document> {
    let id = document_id(doc)?;
    let fields = match doc.get("fields") {
        Some(f) => decode_fields(f)?,
        // a document with no fields omits the key
        None => Fields::new(),
    };
    Ok(Document { id, fields })
}

/// Body for an equality `runQuery` against one collection.
pub fn equality_query(collection: &str, field: &str, value: &str, limit: usize) -> JsonValue {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": field },
                    "op": "EQUAL",
                    "value": FieldValue::from(value).to_firestore(),
                }
            },
            "limit": limit,
        }
    })
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn list_documents(&self, collection: &str, limit: usize) -> StoreResult<Vec<DocumentRef>> {
        let url = format!("{}/{}", self.documents_root, collection);
        let req = self.client.get(url).query(&[("pageSize", limit.to_string())]);
        let body = self.send_json(req).await?;
        let docs = match body.get("documents") {
            Some(JsonValue::Array(docs)) => docs.as_slice(),
            Some(other) => return Err(StoreError::Decode(format!("documents is not an array: {other}"))),
            // empty collection comes back as {}
            None => &[][..],
        };
        let out = docs
            .iter()
            .take(limit)
            .map(|d| document_id(d).map(|id| DocumentRef { id }))
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(collection, count = out.len(), "firestore list");
        Ok(out)
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.documents_root);
        let req = self.client.post(url).json(&equality_query(collection, field, value, limit));
        let body = self.send_json(req).await?;
        let rows = body
            .as_array()
            .ok_or_else(|| StoreError::Decode("runQuery response is not an array".to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            // rows without a document only carry readTime / progress info
            if let Some(doc) = row.get("document") {
                out.push(decode_document(doc)?);
            }
        }
        out.truncate(limit);
        debug!(collection, field, count = out.len(), "firestore query");
        Ok(out)
    }

    async fn put_document(&self, collection: &str, id: &str, fields: DocumentFields) -> StoreResult<()> {
        let url = format!("{}/{}/{}", self.documents_root, collection, id);
        let req = self.client.patch(url).json(&json!({ "fields": encode_fields(&fields) }));
        self.send_json(req).await?;
        debug!(collection, id, "firestore upsert");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}
