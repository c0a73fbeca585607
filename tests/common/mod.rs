#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;

use policyhub::identity::{IdentityError, IdentityGateway, IdentityResult};
use policyhub::server::AppState;
use policyhub::storage::memory::MemoryStore;
use policyhub::storage::{
    Document, DocumentFields, DocumentRef, DocumentStore, StoreError, StoreResult,
};

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub async fn read_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).expect("request")
}

pub fn raw_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// Bind `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

#[derive(Clone, Copy)]
pub enum Outcome {
    Accept,
    Reject(&'static str),
    Down,
}

/// Identity gateway double that counts calls and answers with a fixed outcome.
pub struct StubIdentity {
    pub calls: AtomicUsize,
    outcome: Outcome,
}

impl StubIdentity {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0), outcome })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityGateway for StubIdentity {
    async fn authenticate(&self, email: &str, _password: &str) -> Result<IdentityResult, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Accept => Ok(IdentityResult { user_id: format!("uid:{email}"), id_token: "token".into() }),
            Outcome::Reject(msg) => Err(IdentityError::Rejected(msg.to_string())),
            Outcome::Down => Err(IdentityError::Service("connection refused".into())),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Ok,
    Fail,
    FailWrites,
    Panic,
}

/// Memory store wrapper that counts calls and can be told to fail.
pub struct CountingStore {
    pub inner: MemoryStore,
    pub calls: AtomicUsize,
    mode: StoreMode,
}

impl CountingStore {
    pub fn new(mode: StoreMode) -> Arc<Self> {
        Arc::new(Self { inner: MemoryStore::new(), calls: AtomicUsize::new(0), mode })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, write: bool) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            StoreMode::Ok => Ok(()),
            StoreMode::Fail => Err(StoreError::Transport("deadline exceeded".into())),
            StoreMode::FailWrites if write => Err(StoreError::Status { status: 429, body: "quota".into() }),
            StoreMode::FailWrites => Ok(()),
            StoreMode::Panic => panic!("store exploded"),
        }
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn list_documents(&self, collection: &str, limit: usize) -> StoreResult<Vec<DocumentRef>> {
        self.enter(false)?;
        self.inner.list_documents(collection, limit).await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: usize,
    ) -> StoreResult<Vec<Document>> {
        self.enter(false)?;
        self.inner.query_by_field(collection, field, value, limit).await
    }

    async fn put_document(&self, collection: &str, id: &str, fields: DocumentFields) -> StoreResult<()> {
        self.enter(true)?;
        self.inner.put_document(collection, id, fields).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

pub fn state(identity: Arc<StubIdentity>, store: Arc<CountingStore>) -> AppState {
    AppState::new(identity, store)
}
