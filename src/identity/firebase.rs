use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{IdentityError, IdentityGateway, IdentityResult};

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

#[derive(Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    #[serde(default)]
    local_id: String,
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Interpret a `signInWithPassword` answer.
///
/// An `error.message` always means the credentials were refused, whatever the
/// status (the service answers bad passwords with 400). Anything else that does
/// not carry a `localId` is a service failure.
pub fn parse_sign_in_response(status: u16, body: &[u8]) -> Result<IdentityResult, IdentityError> {
    let parsed: SignInResponse = serde_json::from_slice(body)
        .map_err(|e| IdentityError::Service(format!("HTTP {status}: unparseable response: {e}")))?;
    if let Some(err) = parsed.error.as_ref().filter(|e| !e.message.is_empty()) {
        debug!(code = err.code, message = %err.message, "sign-in refused");
        return Err(IdentityError::Rejected(err.message.clone()));
    }
    if !(200..300).contains(&status) {
        return Err(IdentityError::Service(format!("HTTP {status} without error details")));
    }
    if parsed.local_id.is_empty() {
        return Err(IdentityError::Service("response missing localId".to_string()));
    }
    Ok(IdentityResult { user_id: parsed.local_id, id_token: parsed.id_token })
}

pub struct FirebaseIdentityClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl FirebaseIdentityClient {
    pub fn new(cfg: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| IdentityError::Service(format!("building http client: {e}")))?;
        let endpoint = format!("{}/v1/accounts:signInWithPassword", cfg.base_url.trim_end_matches('/'));
        Ok(Self { client, endpoint, api_key: cfg.api_key.clone() })
    }
}

#[async_trait]
impl IdentityGateway for FirebaseIdentityClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<IdentityResult, IdentityError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&SignInRequest { email, password, return_secure_token: true })
            .send()
            .await
            .map_err(|e| IdentityError::Service(format!("request failed: {e}")))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| IdentityError::Service(format!("reading response: {e}")))?;
        parse_sign_in_response(status, &body)
    }
}

#[cfg(test)]
#[path = "firebase_tests.rs"]
mod firebase_tests;
