//! Process configuration sourced from environment variables.
//!
//! Secrets (identity API key, Firestore token or service-account key) are only
//! ever read from the environment; nothing sensitive has a default.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::identity::{IdentityConfig, DEFAULT_IDENTITY_BASE_URL};
use crate::storage::firestore::{
    FirestoreConfig, FirestoreCredentials, DEFAULT_DATABASE, DEFAULT_FIRESTORE_BASE_URL,
};

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_POLICY_COLLECTION: &str = "policy_test";
pub const DEFAULT_SESSION_COLLECTION: &str = "session_test";
pub const DEFAULT_RESULT_LIMIT: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Firestore,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub http_port: u16,
    pub identity: IdentityConfig,
    pub store: StoreBackend,
    /// Present exactly when `store` is `Firestore`.
    pub firestore: Option<FirestoreConfig>,
    /// Seed file for the memory backend.
    pub memory_seed: Option<PathBuf>,
    pub policy_collection: String,
    pub session_collection: String,
    pub result_limit: usize,
    pub request_timeout: Duration,
}

/// The one field we need from a service-account credentials file.
#[derive(Debug, Deserialize)]
struct ServiceAccount {
    project_id: String,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn project_from_credentials(path: &str) -> Result<String> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read credentials file {path}"))?;
    let sa: ServiceAccount =
        serde_json::from_str(&raw).with_context(|| format!("parse credentials file {path}"))?;
    Ok(sa.project_id)
}

/// A token wins over the key file. Plain-http endpoints (emulators) may run
/// without either; anything else must have one.
fn firestore_credentials(
    base_url: &str,
    token: Option<String>,
    credentials_file: Option<String>,
) -> Result<FirestoreCredentials> {
    match (token, credentials_file) {
        (Some(token), _) => {
            tracing::warn!("POLICYHUB_FIRESTORE_TOKEN is a fixed access token and will not be refreshed");
            Ok(FirestoreCredentials::Token(token))
        }
        (None, Some(path)) => Ok(FirestoreCredentials::ServiceAccount(PathBuf::from(path))),
        (None, None) if base_url.starts_with("http://") => Ok(FirestoreCredentials::Anonymous),
        (None, None) => bail!(
            "firestore at {base_url} needs credentials: set GOOGLE_APPLICATION_CREDENTIALS or POLICYHUB_FIRESTORE_TOKEN"
        ),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| non_empty(lookup(name));

        let http_port = match get("POLICYHUB_HTTP_PORT") {
            Some(v) => v.parse::<u16>().with_context(|| format!("parse POLICYHUB_HTTP_PORT={v:?}"))?,
            None => DEFAULT_HTTP_PORT,
        };
        let bind_host = get("POLICYHUB_BIND_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let timeout_ms = match get("POLICYHUB_REQUEST_TIMEOUT_MS") {
            Some(v) => v.parse::<u64>().with_context(|| format!("parse POLICYHUB_REQUEST_TIMEOUT_MS={v:?}"))?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };
        if timeout_ms == 0 {
            bail!("POLICYHUB_REQUEST_TIMEOUT_MS must be greater than zero");
        }
        let request_timeout = Duration::from_millis(timeout_ms);

        let result_limit = match get("POLICYHUB_RESULT_LIMIT") {
            Some(v) => v.parse::<usize>().with_context(|| format!("parse POLICYHUB_RESULT_LIMIT={v:?}"))?,
            None => DEFAULT_RESULT_LIMIT,
        };
        if result_limit == 0 {
            bail!("POLICYHUB_RESULT_LIMIT must be greater than zero");
        }

        let api_key = get("POLICYHUB_IDENTITY_API_KEY")
            .ok_or_else(|| anyhow!("POLICYHUB_IDENTITY_API_KEY must be set"))?;
        let identity = IdentityConfig {
            base_url: get("POLICYHUB_IDENTITY_BASE_URL").unwrap_or_else(|| DEFAULT_IDENTITY_BASE_URL.to_string()),
            api_key,
            timeout: request_timeout,
        };

        let store = match get("POLICYHUB_STORE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("firestore") => StoreBackend::Firestore,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("unknown POLICYHUB_STORE {other:?} (expected firestore or memory)"),
        };

        let firestore = match store {
            StoreBackend::Memory => None,
            StoreBackend::Firestore => {
                let credentials_file = get("GOOGLE_APPLICATION_CREDENTIALS");
                let project_id = match (get("POLICYHUB_FIRESTORE_PROJECT"), &credentials_file) {
                    (Some(p), _) => p,
                    (None, Some(path)) => project_from_credentials(path)?,
                    (None, None) => bail!(
                        "POLICYHUB_FIRESTORE_PROJECT or GOOGLE_APPLICATION_CREDENTIALS must be set for the firestore store"
                    ),
                };
                // Explicit base URL wins over the emulator convention.
                let base_url = get("POLICYHUB_FIRESTORE_BASE_URL")
                    .or_else(|| get("FIRESTORE_EMULATOR_HOST").map(|h| format!("http://{h}")))
                    .unwrap_or_else(|| DEFAULT_FIRESTORE_BASE_URL.to_string());
                let credentials = firestore_credentials(&base_url, get("POLICYHUB_FIRESTORE_TOKEN"), credentials_file)?;
                Some(FirestoreConfig {
                    base_url,
                    project_id,
                    database: get("POLICYHUB_FIRESTORE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
                    credentials,
                    timeout: request_timeout,
                })
            }
        };

        let memory_seed = get("POLICYHUB_MEMORY_SEED").map(PathBuf::from);
        if memory_seed.is_some() && store != StoreBackend::Memory {
            tracing::warn!("POLICYHUB_MEMORY_SEED ignored: store backend is not memory");
        }

        Ok(Self {
            bind_host,
            http_port,
            identity,
            store,
            firestore,
            memory_seed,
            policy_collection: get("POLICYHUB_POLICY_COLLECTION").unwrap_or_else(|| DEFAULT_POLICY_COLLECTION.to_string()),
            session_collection: get("POLICYHUB_SESSION_COLLECTION").unwrap_or_else(|| DEFAULT_SESSION_COLLECTION.to_string()),
            result_limit,
            request_timeout,
        })
    }

    /// `--http-port N` overrides the environment.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        let mut i = 0;
        while i < args.len() {
            if args[i] == "--http-port" {
                let v = args.get(i + 1).ok_or_else(|| anyhow!("--http-port needs a value"))?;
                self.http_port = v.parse().with_context(|| format!("parse --http-port {v:?}"))?;
                i += 1;
            }
            i += 1;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.http_port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
