//! Route handlers. Each one validates its input, makes at most one call per
//! external client, and folds the outcome into a typed body or an `AppError`.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::Uri;
use axum::Json;
use tracing::{info, warn};

use super::session::SessionRecord;
use super::types::{
    AdminResponse, LoginRequest, LoginResponse, NoPoliciesResponse, PartyPolicies, PolicySummary,
};
use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::IdentityError;

const PARTY_FIELD: &str = "party_id";

pub async fn root() -> &'static str {
    info!("root accessed");
    "policyhub ok"
}

/// Never fails: a segment that is not valid UTF-8 once decoded is echoed lossily.
pub async fn admin(uri: Uri, party_id: Result<Path<String>, PathRejection>) -> Json<AdminResponse> {
    match party_id {
        Ok(Path(party_id)) => admin_for(party_id),
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "admin party_id not utf-8; echoing lossily");
            admin_for(lossy_last_segment(&uri))
        }
    }
}

fn lossy_last_segment(uri: &Uri) -> String {
    let raw = uri.path().rsplit('/').next().unwrap_or_default();
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// `/admin/` with nothing after the slash. An empty party id is accepted here.
pub async fn admin_without_party() -> Json<AdminResponse> {
    admin_for(String::new())
}

fn admin_for(party_id: String) -> Json<AdminResponse> {
    info!(%party_id, "admin page accessed");
    Json(AdminResponse { message: "admin page accessed".to_string(), party_id })
}

pub async fn list_policies(State(state): State<AppState>) -> AppResult<Json<Vec<PolicySummary>>> {
    let docs = state
        .store
        .list_documents(&state.collections.policies, state.result_limit)
        .await?;
    Ok(Json(docs.into_iter().map(|d| PolicySummary { id: d.id }).collect()))
}

pub async fn policies_by_party(
    State(state): State<AppState>,
    party_id: Result<Path<String>, PathRejection>,
) -> AppResult<Json<PartyPolicies>> {
    let Path(party_id) = party_id.map_err(|rejection| {
        warn!(reason = %rejection.body_text(), "bad party_id in path");
        AppError::user("invalid_party_id", "party_id is not valid")
    })?;
    policies_for(&state, &party_id).await
}

/// `/policy/` with nothing after the slash: a missing party id, rejected with 400.
pub async fn policies_without_party(State(state): State<AppState>) -> AppResult<Json<PartyPolicies>> {
    policies_for(&state, "").await
}

async fn policies_for(state: &AppState, party_id: &str) -> AppResult<Json<PartyPolicies>> {
    if party_id.is_empty() {
        return Err(AppError::user("missing_party_id", "party_id is required"));
    }
    info!(%party_id, "fetching policies for party");
    let docs = state
        .store
        .query_by_field(&state.collections.policies, PARTY_FIELD, party_id, state.result_limit)
        .await?;
    if docs.is_empty() {
        return Ok(Json(PartyPolicies::Empty(NoPoliciesResponse {
            message: format!("no policies found for party {party_id}"),
            policies: Vec::new(),
        })));
    }
    Ok(Json(PartyPolicies::Found(docs.into_iter().map(|d| d.into_payload()).collect())))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(req) = payload.map_err(|rejection| {
        warn!(reason = %rejection.body_text(), "malformed login body");
        AppError::user("invalid_body", "malformed request body")
    })?;
    if req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::user("missing_credentials", "email and password are required"));
    }
    info!(email = %req.email, "login attempt");

    let identity = match state.identity.authenticate(&req.email, &req.password).await {
        Ok(identity) => identity,
        Err(IdentityError::Rejected(reason)) => {
            warn!(email = %req.email, %reason, "login rejected");
            return Err(IdentityError::Rejected(reason).into());
        }
        Err(err) => return Err(err.into()),
    };

    let record = SessionRecord::issue(identity.user_id);
    state
        .store
        .put_document(&state.collections.sessions, &record.key(), record.fields())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, session_id = %record.session_id, "failed to persist session");
            AppError::internal("session_store_failed", "failed to save session")
        })?;
    info!(session_id = %record.session_id, user_id = %record.user_id, "session created");

    Ok(Json(LoginResponse { message: "authenticated".to_string(), session_id: record.key() }))
}
