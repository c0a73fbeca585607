//! Wire shapes for every route. One struct per response so the JSON contract is
//! checked at compile time.

use serde::{Deserialize, Serialize};

use crate::storage::Fields;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub message: String,
    pub party_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoPoliciesResponse {
    pub message: String,
    pub policies: Vec<Fields>,
}

/// `GET /policy/{party_id}` answers with a bare array when something matched and
/// with a message envelope when nothing did.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PartyPolicies {
    Found(Vec<Fields>),
    Empty(NoPoliciesResponse),
}
