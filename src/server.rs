//!
//! policyhub HTTP server
//! ---------------------
//! Axum application for the policy API.
//!
//! Responsibilities:
//! - Build the two external clients once at startup and inject them through `AppState`.
//! - Mount the static route table (`/`, `/admin/{party_id}`, `/policy`,
//!   `/policy/{party_id}`, `/login`).
//! - Request tracing and panic recovery around every route.
//! - Serve until Ctrl-C, then drain in-flight requests.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{self, AppConfig, StoreBackend};
use crate::error::AppError;
use crate::identity::{FirebaseIdentityClient, SharedIdentityGateway};
use crate::storage::firestore::FirestoreStore;
use crate::storage::memory::MemoryStore;
use crate::storage::SharedDocumentStore;

pub mod handlers;
pub mod session;
pub mod types;

/// Collection names used by the handlers.
#[derive(Debug, Clone)]
pub struct Collections {
    pub policies: String,
    pub sessions: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            policies: config::DEFAULT_POLICY_COLLECTION.to_string(),
            sessions: config::DEFAULT_SESSION_COLLECTION.to_string(),
        }
    }
}

/// Shared server state injected into all handlers.
///
/// Both client handles are set once here and only read afterwards, so the
/// state is cheap to clone per request and needs no locking.
#[derive(Clone)]
pub struct AppState {
    pub identity: SharedIdentityGateway,
    pub store: SharedDocumentStore,
    pub collections: Collections,
    /// Cap on documents returned by the policy routes.
    pub result_limit: usize,
}

impl AppState {
    pub fn new(identity: SharedIdentityGateway, store: SharedDocumentStore) -> Self {
        Self { identity, store, collections: Collections::default(), result_limit: config::DEFAULT_RESULT_LIMIT }
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "handler panicked");
    AppError::internal("internal", "internal server error").into_response()
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/admin/{party_id}", get(handlers::admin))
        .route("/admin/", get(handlers::admin_without_party))
        .route("/policy", get(handlers::list_policies))
        .route("/policy/{party_id}", get(handlers::policies_by_party))
        .route("/policy/", get(handlers::policies_without_party))
        .route("/login", post(handlers::login))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Construct both clients from configuration.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let identity: SharedIdentityGateway =
        Arc::new(FirebaseIdentityClient::new(&config.identity).context("identity client")?);

    let store: SharedDocumentStore = match config.store {
        StoreBackend::Firestore => {
            let fs = config.firestore.as_ref().context("firestore configuration missing")?;
            Arc::new(FirestoreStore::new(fs).context("firestore client")?)
        }
        StoreBackend::Memory => {
            let mem = MemoryStore::new();
            if let Some(path) = &config.memory_seed {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("read memory seed {}", path.display()))?;
                let seed: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("parse memory seed {}", path.display()))?;
                let loaded = mem.load_seed(&seed).context("load memory seed")?;
                info!(documents = loaded, path = %path.display(), "memory store seeded");
            }
            Arc::new(mem)
        }
    };

    Ok(AppState {
        identity,
        store,
        collections: Collections {
            policies: config.policy_collection.clone(),
            sessions: config.session_collection.clone(),
        },
        result_limit: config.result_limit,
    })
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

pub async fn run_with_shutdown<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = build_state(&config).await?;
    info!(
        backend = state.store.backend_name(),
        policies = %state.collections.policies,
        sessions = %state.collections.sessions,
        limit = state.result_limit,
        "document store ready"
    );
    let app = build_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("Starting server on {}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    info!("server stopped");
    Ok(())
}
