//! Route-level tests: the full router driven through `oneshot` with in-process
//! identity and store doubles.

mod common;

use std::collections::HashSet;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use common::{get, raw_post, read_json, read_text, state, CountingStore, Outcome, StoreMode, StubIdentity};
use policyhub::server::build_router;

fn seed_policies(store: &CountingStore, n: usize, party: &str) {
    for i in 0..n {
        let fields = json!({"party_id": party, "title": format!("policy {i}"), "rank": i});
        store
            .inner
            .insert_json("policy_test", &format!("{party}-{i:02}"), fields.as_object().cloned().unwrap());
    }
}

#[tokio::test]
async fn root_answers_plain_text() {
    let app = build_router(state(StubIdentity::new(Outcome::Accept), CountingStore::new(StoreMode::Ok)));
    let response = app.oneshot(get("/")).await.expect("root");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!read_text(response).await.is_empty());
}

#[tokio::test]
async fn admin_echoes_party_id_even_when_empty() {
    let store = CountingStore::new(StoreMode::Ok);
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store.clone()));

    let response = app.clone().oneshot(get("/admin/ldp")).await.expect("admin");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["party_id"], json!("ldp"));
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    let response = app.oneshot(get("/admin/")).await.expect("admin empty");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["party_id"], json!(""));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn admin_echoes_undecodable_party_id_lossily() {
    let app = build_router(state(StubIdentity::new(Outcome::Accept), CountingStore::new(StoreMode::Ok)));
    let response = app.oneshot(get("/admin/ab%FF")).await.expect("admin");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["party_id"], json!("ab\u{FFFD}"));
}

#[tokio::test]
async fn policy_list_returns_only_ids() {
    let store = CountingStore::new(StoreMode::Ok);
    seed_policies(&store, 4, "ldp");
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store));

    let response = app.oneshot(get("/policy")).await.expect("list");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let items = body.as_array().expect("array");
    assert_eq!(items.len(), 4);
    for (i, item) in items.iter().enumerate() {
        let obj = item.as_object().expect("object");
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["id"], json!(format!("ldp-{i:02}")));
    }
}

#[tokio::test]
async fn policy_list_is_capped_at_ten() {
    let store = CountingStore::new(StoreMode::Ok);
    seed_policies(&store, 13, "cdp");
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store));
    let body = read_json(app.oneshot(get("/policy")).await.expect("list")).await;
    assert_eq!(body.as_array().map(|a| a.len()), Some(10));
}

#[tokio::test]
async fn policy_list_on_empty_store_is_empty_array() {
    let app = build_router(state(StubIdentity::new(Outcome::Accept), CountingStore::new(StoreMode::Ok)));
    let response = app.oneshot(get("/policy")).await.expect("list");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!([]));
}

#[tokio::test]
async fn policy_list_storage_failure_is_500_without_detail() {
    let app = build_router(state(StubIdentity::new(Outcome::Accept), CountingStore::new(StoreMode::Fail)));
    let response = app.oneshot(get("/policy")).await.expect("list");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["code"], json!("storage_error"));
    assert!(!body["error"].as_str().unwrap_or_default().contains("deadline"));
}

#[tokio::test]
async fn policies_by_party_returns_full_documents_with_id() {
    let store = CountingStore::new(StoreMode::Ok);
    seed_policies(&store, 2, "ldp");
    seed_policies(&store, 3, "cdp");
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store));

    let response = app.oneshot(get("/policy/cdp")).await.expect("by party");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let docs = body.as_array().expect("array");
    assert_eq!(docs.len(), 3);
    let ids: HashSet<&str> = docs.iter().filter_map(|d| d["id"].as_str()).collect();
    assert_eq!(ids, HashSet::from(["cdp-00", "cdp-01", "cdp-02"]));
    for d in docs {
        assert_eq!(d["party_id"], json!("cdp"));
        assert!(d["title"].is_string());
    }
}

#[tokio::test]
async fn policies_by_party_with_no_match_is_200_envelope() {
    let store = CountingStore::new(StoreMode::Ok);
    seed_policies(&store, 2, "ldp");
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store));

    let response = app.oneshot(get("/policy/jcp")).await.expect("by party");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["policies"], json!([]));
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn policies_by_party_empty_id_is_400_before_store() {
    let store = CountingStore::new(StoreMode::Ok);
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store.clone()));

    let response = app.oneshot(get("/policy/")).await.expect("by party");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert_eq!(body["code"], json!("missing_party_id"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn policies_by_party_undecodable_id_is_json_400() {
    let store = CountingStore::new(StoreMode::Ok);
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store.clone()));

    let response = app.oneshot(get("/policy/%FF")).await.expect("by party");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response.headers().get("content-type").and_then(|v| v.to_str().ok()).map(str::to_string);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let body = read_json(response).await;
    assert_eq!(body["code"], json!("invalid_party_id"));
    assert!(body["error"].is_string());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn policies_by_party_storage_failure_is_500() {
    let app = build_router(state(StubIdentity::new(Outcome::Accept), CountingStore::new(StoreMode::Fail)));
    let response = app.oneshot(get("/policy/ldp")).await.expect("by party");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn login_issues_distinct_session_ids_and_persists_them() {
    let identity = StubIdentity::new(Outcome::Accept);
    let store = CountingStore::new(StoreMode::Ok);
    let app = build_router(state(identity.clone(), store.clone()));

    let mut seen = HashSet::new();
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(raw_post("/login", r#"{"email":"a@example.com","password":"pw"}"#))
            .await
            .expect("login");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        let sid = body["session_id"].as_str().expect("session_id").to_string();
        assert!(uuid::Uuid::parse_str(&sid).is_ok(), "not a uuid: {sid}");

        let stored = store.inner.get("session_test", &sid).expect("session stored");
        assert_eq!(stored["user_id"], json!("uid:a@example.com"));
        assert!(stored["created_at"].is_string());
        assert!(seen.insert(sid));
    }
    assert_eq!(identity.calls(), 3);
    assert_eq!(store.inner.len("session_test"), 3);
}

#[tokio::test]
async fn login_rejection_is_401_with_upstream_reason() {
    let store = CountingStore::new(StoreMode::Ok);
    let app = build_router(state(StubIdentity::new(Outcome::Reject("INVALID_PASSWORD")), store.clone()));

    let response = app
        .oneshot(raw_post("/login", r#"{"email":"a@example.com","password":"nope"}"#))
        .await
        .expect("login");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert!(body["error"].as_str().unwrap_or_default().contains("INVALID_PASSWORD"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn login_malformed_body_is_400_with_no_upstream_calls() {
    let identity = StubIdentity::new(Outcome::Accept);
    let store = CountingStore::new(StoreMode::Ok);
    let app = build_router(state(identity.clone(), store.clone()));

    for body in [r#"{"email": "a@example.com", "password": "#, "not json", r#"["a","b"]"#] {
        let response = app.clone().oneshot(raw_post("/login", body)).await.expect("login");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(read_json(response).await["code"], json!("invalid_body"));
    }
    assert_eq!(identity.calls(), 0);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn login_missing_field_is_400() {
    let identity = StubIdentity::new(Outcome::Accept);
    let app = build_router(state(identity.clone(), CountingStore::new(StoreMode::Ok)));

    for body in [r#"{"email":"a@example.com"}"#, r#"{"email":"","password":"pw"}"#, "{}"] {
        let response = app.clone().oneshot(raw_post("/login", body)).await.expect("login");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(read_json(response).await["code"], json!("missing_credentials"));
    }
    assert_eq!(identity.calls(), 0);
}

#[tokio::test]
async fn login_identity_outage_is_500() {
    let store = CountingStore::new(StoreMode::Ok);
    let app = build_router(state(StubIdentity::new(Outcome::Down), store.clone()));
    let response = app
        .oneshot(raw_post("/login", r#"{"email":"a@example.com","password":"pw"}"#))
        .await
        .expect("login");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(response).await;
    assert_eq!(body["code"], json!("identity_unavailable"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn login_session_write_failure_is_500() {
    let store = CountingStore::new(StoreMode::FailWrites);
    let app = build_router(state(StubIdentity::new(Outcome::Accept), store.clone()));
    let response = app
        .oneshot(raw_post("/login", r#"{"email":"a@example.com","password":"pw"}"#))
        .await
        .expect("login");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await["code"], json!("session_store_failed"));
    assert_eq!(store.calls(), 1);
    assert_eq!(store.inner.len("session_test"), 0);
}

#[tokio::test]
async fn handler_panic_becomes_500() {
    let app = build_router(state(StubIdentity::new(Outcome::Accept), CountingStore::new(StoreMode::Panic)));
    let response = app.oneshot(get("/policy")).await.expect("panic");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await["code"], json!("internal"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_router(state(StubIdentity::new(Outcome::Accept), CountingStore::new(StoreMode::Ok)));
    let response = app.oneshot(get("/nowhere")).await.expect("404");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn custom_collections_and_limit_are_honoured() {
    let store = CountingStore::new(StoreMode::Ok);
    for i in 0..5 {
        store.inner.insert_json("manifesto", &format!("m{i}"), json!({"party_id": "x"}).as_object().cloned().unwrap());
    }
    let mut st = state(StubIdentity::new(Outcome::Accept), store.clone());
    st.collections.policies = "manifesto".to_string();
    st.collections.sessions = "logins".to_string();
    st.result_limit = 3;
    let app = build_router(st);

    let body = read_json(app.clone().oneshot(get("/policy/x")).await.expect("party")).await;
    assert_eq!(body.as_array().map(|a| a.len()), Some(3));

    let body = read_json(
        app.oneshot(raw_post("/login", r#"{"email":"e","password":"p"}"#)).await.expect("login"),
    )
    .await;
    let sid = body["session_id"].as_str().expect("sid");
    assert!(store.inner.get("logins", sid).is_some());
}
