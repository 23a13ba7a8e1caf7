use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use pockity_audit::AuditStore;
use pockity_audit_memory::MemoryAuditStore;
use pockity_blob::{MemoryObjectStore, ObjectStore};
use pockity_core::{Quota, Role};
use pockity_gateway::GatewayBuilder;
use pockity_server::api::{AppState, router};
use pockity_server::auth::{AuthProvider, JwtManager};
use pockity_state_memory::{MemoryDistributedLock, MemoryStateStore};

const SECRET: &str = "test-secret";
const BASE_URL: &str = "http://localhost/files";

// -- Helpers --------------------------------------------------------------

struct TestApp {
    state: AppState,
    app: Router,
}

fn build_app(quota: Quota, audit: Option<Arc<dyn AuditStore>>) -> TestApp {
    let files = Arc::new(MemoryObjectStore::new(BASE_URL, "signing-key"));
    let mut builder = GatewayBuilder::new()
        .state(Arc::new(MemoryStateStore::new()))
        .lock(Arc::new(MemoryDistributedLock::new()))
        .object_store(Arc::clone(&files) as Arc<dyn ObjectStore>)
        .default_quota(quota);
    if let Some(ref store) = audit {
        builder = builder.audit(Arc::clone(store));
    }
    let gateway = Arc::new(builder.build().expect("gateway should build"));

    let auth = Arc::new(AuthProvider::new(
        SECRET,
        vec!["root".to_owned()],
        Arc::clone(gateway.credentials()),
    ));
    let state = AppState {
        gateway,
        audit,
        auth,
        files: Some(files),
    };
    TestApp {
        app: router(state.clone()),
        state,
    }
}

fn default_app() -> TestApp {
    build_app(Quota::default(), None)
}

fn token(sub: &str, role: Role) -> String {
    JwtManager::new(SECRET).issue(sub, role, 300).unwrap()
}

fn bearer(sub: &str) -> String {
    format!("Bearer {}", token(sub, Role::User))
}

fn admin() -> String {
    format!("Bearer {}", token("root", Role::User))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn put_object(auth: &str, name: &str, data: &'static [u8], content_type: &str) -> Request<Body> {
    Request::put(format!("/v1/objects/{name}"))
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(data))
        .unwrap()
}

fn get(path: &str, auth: &str) -> Request<Body> {
    Request::get(path)
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, auth: &str, body: &Value) -> Request<Body> {
    Request::post(path)
        .header(header::AUTHORIZATION, auth)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_is_public() {
    let t = default_app();
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["metrics"]["uploads"], 0);
}

#[tokio::test]
async fn protected_routes_require_credentials() {
    let t = default_app();

    let req = Request::get("/v1/objects").body(Body::empty()).unwrap();
    let (status, body) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&t.app, get("/v1/objects", "Bearer not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::get("/v1/usage")
        .header("x-api-key", "pk_unknown")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upload_list_head_delete_roundtrip() {
    let t = default_app();
    let alice = bearer("alice");

    let (status, receipt) = send(
        &t.app,
        put_object(&alice, "docs/report.txt", b"hello world", "text/plain"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["fileName"], "docs/report.txt");
    assert_eq!(receipt["size"], 11);
    assert_eq!(receipt["contentType"], "text/plain");
    assert!(receipt["url"].as_str().unwrap().starts_with(BASE_URL));

    let (status, listing) = send(&t.app, get("/v1/objects", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["totalSize"], 11);

    let (status, entry) = send(&t.app, get("/v1/objects/docs/report.txt", &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["sizeBytes"], 11);
    assert_eq!(entry["contentType"], "text/plain");

    let (_, usage) = send(&t.app, get("/v1/usage", &alice)).await;
    assert_eq!(usage["bytesUsed"], 11);
    assert_eq!(usage["objectCount"], 1);

    let req = Request::delete("/v1/objects/docs/report.txt")
        .header(header::AUTHORIZATION, &alice)
        .body(Body::empty())
        .unwrap();
    let (status, deleted) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["sizeBytes"], 11);

    let (_, usage) = send(&t.app, get("/v1/usage", &alice)).await;
    assert_eq!(usage["bytesUsed"], 0);
    assert_eq!(usage["objectCount"], 0);

    let (status, _) = send(&t.app, get("/v1/objects/docs/report.txt", &alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tenants_see_only_their_objects() {
    let t = default_app();
    send(&t.app, put_object(&bearer("alice"), "a.txt", b"aaa", "text/plain")).await;

    let (_, listing) = send(&t.app, get("/v1/objects", &bearer("bob"))).await;
    assert_eq!(listing["count"], 0);

    let (status, _) = send(&t.app, get("/v1/objects/a.txt", &bearer("bob"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn over_quota_upload_returns_capacity_body() {
    let t = build_app(Quota::new(10, 5), None);
    let alice = bearer("alice");

    let (status, body) = send(
        &t.app,
        put_object(&alice, "big.bin", b"0123456789abc", "application/octet-stream"),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["quotaExceeded"], true);
    assert_eq!(body["maxBytes"], 10);
    assert_eq!(body["maxObjects"], 5);
    assert_eq!(body["fileSize"], 13);
    assert!(body["error"].is_string());

    let (_, usage) = send(&t.app, get("/v1/usage", &alice)).await;
    assert_eq!(usage["bytesUsed"], 0);
}

#[tokio::test]
async fn invalid_name_is_bad_request() {
    let t = default_app();
    let (status, _) = send(
        &t.app,
        put_object(&bearer("alice"), "../escape.txt", b"x", "text/plain"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_delete_reports_each_name() {
    let t = default_app();
    let alice = bearer("alice");
    send(&t.app, put_object(&alice, "a.txt", b"aa", "text/plain")).await;
    send(&t.app, put_object(&alice, "b.txt", b"bbb", "text/plain")).await;

    let (status, report) = send(
        &t.app,
        post_json(
            "/v1/objects/bulk-delete",
            &alice,
            &json!({ "fileNames": ["a.txt", "b.txt", "missing.txt"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["results"].as_array().unwrap().len(), 3);
    assert_eq!(report["succeeded"], 2);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["totalSizeDeleted"], 5);

    let (status, _) = send(
        &t.app,
        post_json("/v1/objects/bulk-delete", &alice, &json!({ "fileNames": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_reject_plain_users() {
    let t = default_app();
    for path in [
        "/v1/admin/requests",
        "/v1/admin/tenants/user-alice/usage",
        "/v1/admin/audit",
    ] {
        let (status, _) = send(&t.app, get(path, &bearer("alice"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{path}");
    }
}

#[tokio::test]
async fn admin_role_claim_is_honoured() {
    let t = default_app();
    let auth = format!("Bearer {}", token("carol", Role::Admin));
    let (status, body) = send(&t.app, get("/v1/admin/requests", &auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn key_request_approval_flow() {
    let t = default_app();
    let alice = bearer("alice");

    let new_key = json!({
        "kind": "CREATE",
        "requestedBytes": 2048,
        "requestedObjects": 4,
        "name": "ci",
    });
    let (status, request) = send(&t.app, post_json("/v1/requests", &alice, &new_key)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "PENDING");
    let id = request["id"].as_str().unwrap().to_owned();

    let (status, _) = send(&t.app, post_json("/v1/requests", &alice, &new_key)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, own) = send(&t.app, get(&format!("/v1/requests/{id}"), &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["id"], id.as_str());
    let (status, _) = send(&t.app, get(&format!("/v1/requests/{id}"), &bearer("bob"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, pending) = send(&t.app, get("/v1/admin/requests?status=PENDING", &admin())).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, decision) = send(
        &t.app,
        post_json(
            &format!("/v1/admin/requests/{id}/approve"),
            &admin(),
            &json!({ "note": "ok" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["request"]["status"], "APPROVED");
    let secret = decision["credential"]["secret"].as_str().unwrap().to_owned();

    let (status, _) = send(
        &t.app,
        post_json(&format!("/v1/admin/requests/{id}/reject"), &admin(), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = Request::put("/v1/objects/build.log")
        .header("x-api-key", &secret)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("log line"))
        .unwrap();
    let (status, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::CREATED);

    let req = Request::get("/v1/usage")
        .header("x-api-key", &secret)
        .body(Body::empty())
        .unwrap();
    let (_, usage) = send(&t.app, req).await;
    assert_eq!(usage["maxBytes"], 2048);
    assert_eq!(usage["maxObjects"], 4);
    assert_eq!(usage["bytesUsed"], 8);

    let (_, keys) = send(&t.app, get("/v1/keys", &alice)).await;
    assert_eq!(keys.as_array().unwrap().len(), 1);
    assert_eq!(keys[0]["name"], "ci");

    let req = Request::get("/v1/keys")
        .header("x-api-key", &secret)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&t.app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rejected_request_leaves_limits_alone() {
    let t = build_app(Quota::new(100, 2), None);
    let alice = bearer("alice");

    let (_, request) = send(
        &t.app,
        post_json(
            "/v1/requests",
            &alice,
            &json!({ "kind": "UPGRADE", "requestedBytes": 1000, "requestedObjects": 10 }),
        ),
    )
    .await;
    let id = request["id"].as_str().unwrap();

    let (status, rejected) = send(
        &t.app,
        post_json(&format!("/v1/admin/requests/{id}/reject"), &admin(), &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "REJECTED");

    let (_, usage) = send(&t.app, get("/v1/usage", &alice)).await;
    assert_eq!(usage["maxBytes"], 100);
    assert_eq!(usage["maxObjects"], 2);
}

#[tokio::test]
async fn signed_url_downloads_content() {
    let t = default_app();
    let (_, receipt) = send(
        &t.app,
        put_object(&bearer("alice"), "pic.png", b"\x89PNG", "image/png"),
    )
    .await;
    let url = receipt["url"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost").unwrap().to_owned();

    let response = t
        .app
        .clone()
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"\x89PNG");

    let (base, _) = path.split_once("&signature=").unwrap();
    let tampered = format!("{base}&signature=00ff");
    let (status, _) = send(&t.app, Request::get(&tampered).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signed_url_survives_reserved_characters_in_the_name() {
    let t = default_app();
    let (status, receipt) = send(
        &t.app,
        put_object(
            &bearer("alice"),
            "q3/report%20%231%3F%20100%25.pdf",
            b"%PDF-1.7",
            "application/pdf",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["fileName"], "q3/report #1? 100%.pdf");

    let url = receipt["url"].as_str().unwrap();
    assert!(url.contains("/q3/report%20%231%3F%20100%25.pdf?expires="));
    let path = url.strip_prefix("http://localhost").unwrap().to_owned();
    let response = t
        .app
        .clone()
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7");
}

#[tokio::test]
async fn admin_reconcile_and_usage() {
    let t = default_app();
    send(&t.app, put_object(&bearer("alice"), "a.txt", b"abcd", "text/plain")).await;

    let (status, usage) = send(&t.app, get("/v1/admin/tenants/user-alice/usage", &admin())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["bytesUsed"], 4);

    let (status, report) = send(
        &t.app,
        post_json(
            "/v1/admin/tenants/user-alice/reconcile?repair=true",
            &admin(),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["ledgerBytes"], report["actualBytes"]);
    assert_eq!(report["repaired"], false);

    let (status, _) = send(&t.app, get("/v1/admin/tenants/nobody/usage", &admin())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn audit_trail_is_queryable_by_admins() {
    let audit = Arc::new(MemoryAuditStore::new());
    let t = build_app(Quota::default(), Some(audit as Arc<dyn AuditStore>));
    send(&t.app, put_object(&bearer("alice"), "a.txt", b"abc", "text/plain")).await;
    t.state.gateway.shutdown().await;

    let (status, page) = send(
        &t.app,
        get("/v1/admin/audit?tenant=user-alice&event=object_uploaded", &admin()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["records"][0]["file_name"], "a.txt");
}

#[tokio::test]
async fn audit_query_without_store_is_not_found() {
    let t = default_app();
    let (status, _) = send(&t.app, get("/v1/admin/audit", &admin())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
