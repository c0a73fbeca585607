//! Identity gateway: password sign-in against the hosted identity service.
//! Keep the public surface thin; the REST client lives in `firebase`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

mod firebase;

pub use firebase::{parse_sign_in_response, FirebaseIdentityClient, IdentityConfig, DEFAULT_IDENTITY_BASE_URL};

/// A successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResult {
    pub user_id: String,
    pub id_token: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The service answered and refused the credentials.
    #[error("rejected by identity service: {0}")]
    Rejected(String),
    /// The service could not be reached or its answer made no sense.
    #[error("identity service error: {0}")]
    Service(String),
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    async fn authenticate(&self, email: &str, password: &str) -> Result<IdentityResult, IdentityError>;
}

pub type SharedIdentityGateway = Arc<dyn IdentityGateway>;
