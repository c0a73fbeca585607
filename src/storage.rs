//!
//! policyhub storage module
//! ------------------------
//! Document store seam used by the HTTP handlers. A store holds named, schemaless
//! collections of `id -> fields` documents and supports three operations:
//! listing up to N document ids, fetching up to N documents whose string field
//! equals a value, and upserting one document at a caller-chosen key.
//!
//! Two backends implement the `DocumentStore` trait:
//! - `firestore::FirestoreStore` talks to Cloud Firestore over its REST API.
//! - `memory::MemoryStore` keeps everything in process for local runs and tests.
//!
//! Failures are never swallowed: every transport, status or decode problem comes
//! back as a `StoreError` and the caller decides how to surface it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub mod firestore;
pub mod memory;
pub mod value;

pub use value::FieldValue;

/// Plain JSON view of a document's stored fields.
pub type Fields = serde_json::Map<String, JsonValue>;

/// Typed fields for writes, so timestamps reach the backend as timestamps.
pub type DocumentFields = BTreeMap<String, FieldValue>;

/// Identifier-only view returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
}

/// A full document: its key plus whatever fields the store holds for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Flatten into a single JSON object with `id` injected next to the stored fields.
    /// A stored field literally named `id` is overwritten by the document key.
    pub fn into_payload(self) -> Fields {
        let mut fields = self.fields;
        fields.insert("id".to_string(), JsonValue::String(self.id));
        fields
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("credentials error: {0}")]
    Credentials(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `limit` document ids from `collection`, in the order the store yields them.
    async fn list_documents(&self, collection: &str, limit: usize) -> StoreResult<Vec<DocumentRef>>;

    /// Up to `limit` documents whose `field` equals the string `value`.
    /// No match is an empty vector, not an error.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> StoreResult<Vec<Document>>;

    /// Create or fully replace the document at `collection/id`.
    async fn put_document(&self, collection: &str, id: &str, fields: DocumentFields) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}

pub type SharedDocumentStore = Arc<dyn DocumentStore>;

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
