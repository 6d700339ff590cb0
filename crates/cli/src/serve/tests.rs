//! In-process tests of the HTTP surface.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use a2p_core::{RegistrationPatch, RegistrationStatus, Stage, StepState};
use a2p_storage::{MemoryStore, RegistrationStore};
use a2p_workflow::testing::{sample_form, Operation, RecordingTrustHub};
use a2p_workflow::ActivityLog;

use super::router;
use super::state::AppState;

struct Harness {
    app: axum::Router,
    store: Arc<MemoryStore>,
    hub: Arc<RecordingTrustHub>,
}

fn harness_on(store: Arc<MemoryStore>, api_key: Option<&str>) -> Harness {
    let hub = Arc::new(RecordingTrustHub::new());
    let state = Arc::new(AppState::new(
        store.clone(),
        hub.clone(),
        "https://a2p.example.com",
        Arc::new(ActivityLog::new(20)),
        0,
        api_key.map(str::to_string),
    ));
    Harness {
        app: router(state),
        store,
        hub,
    }
}

fn harness_with_key(api_key: Option<&str>) -> Harness {
    harness_on(Arc::new(MemoryStore::new()), api_key)
}

fn harness() -> Harness {
    harness_with_key(None)
}

/// A harness whose store snapshot directory is already gone, so every
/// write fails. The `TempDir` must outlive the harness.
fn harness_with_unwritable_store() -> (Harness, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("data");
    std::fs::create_dir(&sub).unwrap();
    let store = Arc::new(MemoryStore::open(sub.join("a2p.json")).unwrap());
    std::fs::remove_dir_all(&sub).unwrap();
    (harness_on(store, None), dir)
}

fn assert_error_body(body: &Value, message: &str) {
    assert_eq!(body["success"], false, "{body}");
    assert_eq!(body["message"], message, "{body}");
    assert!(
        !body["error"].as_str().unwrap_or_default().is_empty(),
        "{body}"
    );
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn registration_body(user_id: &str) -> Value {
    let mut body = serde_json::to_value(sample_form()).unwrap();
    body["userId"] = json!(user_id);
    body
}

// ──────────────────────────────────────────────
// Health and routing
// ──────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
    let h = harness();
    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let h = harness();
    let (status, body) = send(&h.app, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

// ──────────────────────────────────────────────
// POST /a2p
// ──────────────────────────────────────────────

#[tokio::test]
async fn full_registration_returns_every_sid() {
    let h = harness();
    let (status, body) = send(&h.app, post_json("/a2p", &registration_body("loc-1"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "A2P registration submitted successfully");
    for key in [
        "customerProfileSid",
        "trustProductSid",
        "brandRegistrationSid",
        "messagingServiceSid",
        "campaignSid",
    ] {
        let sid = body["data"][key].as_str().unwrap_or_default();
        assert!(!sid.is_empty(), "{key} missing in {body}");
    }

    let id = body["registrationId"].as_str().unwrap();
    let stored = h.store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.user_id, "loc-1");
    assert!(stored
        .steps
        .values()
        .all(|step| step.status == StepState::Completed));
}

#[tokio::test]
async fn trust_product_failure_is_a_400_naming_the_stage() {
    let h = harness();
    h.hub.fail_on(Operation::CreateTrustProduct, "limit exceeded");

    let (status, body) = send(&h.app, post_json("/a2p", &registration_body("loc-1"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Failed to create trust product");
    assert_eq!(body["error"], "limit exceeded");
    assert_eq!(body["stage"], "trustProduct");
    assert!(body.get("data").is_none());

    assert_eq!(h.hub.count(Operation::CreateBrandRegistration), 0);
    assert_eq!(h.hub.count(Operation::CreateMessagingService), 0);
    assert_eq!(h.hub.count(Operation::CreateCampaign), 0);

    // The orphaned customer profile stays visible on the record.
    let id = body["registrationId"].as_str().unwrap();
    let (status, record) = send(&h.app, get(&format!("/registrations/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["customerProfileSid"], "CP1");
    assert_eq!(record["status"], "rejected");
    assert_eq!(record["steps"]["trustProduct"]["status"], "failed");
    assert_eq!(record["steps"]["campaign"]["status"], "pending");
}

#[tokio::test]
async fn invalid_form_creates_nothing() {
    let h = harness();
    let mut body = registration_body("loc-1");
    body["ein"] = json!("12-34");

    let (status, response) = send(&h.app, post_json("/a2p", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["message"], "Invalid registration form");
    assert!(response["error"].as_str().unwrap().contains("ein"));
    assert!(h.hub.calls().is_empty());
    assert!(h.store.list_by_owner("loc-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_400() {
    let h = harness();
    let (status, body) = send(&h.app, post_json("/a2p", &json!({"legalCompanyName": "X"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid registration form");
    assert!(h.hub.calls().is_empty());
}

// ──────────────────────────────────────────────
// Registration queries
// ──────────────────────────────────────────────

#[tokio::test]
async fn store_failure_on_register_is_a_500() {
    let (h, _dir) = harness_with_unwritable_store();
    let (status, body) = send(&h.app, post_json("/a2p", &registration_body("loc-1"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error_body(&body, "A2P registration failed");
    assert_eq!(h.hub.count(Operation::CreateCustomerProfile), 0);
    assert!(h.store.list_by_owner("loc-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_webhook_dump_is_a_500() {
    let (h, _dir) = harness_with_unwritable_store();
    let (status, body) = send(
        &h.app,
        post_json(
            "/webhooks/a2p/brand",
            &json!({"BrandSid": "BN123", "BrandStatus": "APPROVED"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error_body(&body, "Failed to record callback");
    assert!(h.store.list_webhook_dumps(0).await.unwrap().is_empty());

    let (status, body) = send(
        &h.app,
        post_json("/webhooks/twilio/status", &json!({"MessageSid": "SM1"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_error_body(&body, "Failed to record callback");
}

#[tokio::test]
async fn list_requires_user_id() {
    let h = harness();
    let (status, _) = send(&h.app, get("/registrations")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_returns_only_the_owners_registrations() {
    let h = harness();
    h.store.create("loc-1", sample_form()).await.unwrap();
    h.store.create("loc-1", sample_form()).await.unwrap();
    h.store.create("loc-2", sample_form()).await.unwrap();

    let (status, body) = send(&h.app, get("/registrations?userId=loc-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registrations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_registration_is_404() {
    let h = harness();
    let (status, body) = send(&h.app, get("/registrations/doesnotexist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Registration not found");
}

#[tokio::test]
async fn watch_times_out_without_changes() {
    let h = harness();
    h.store.create("loc-1", sample_form()).await.unwrap();

    let (status, body) = send(&h.app, get("/registrations/watch?userId=loc-1&timeoutSecs=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], false);
    assert_eq!(body["registrations"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn watch_wakes_on_an_owner_write() {
    let h = harness();
    let reg = h.store.create("loc-1", sample_form()).await.unwrap();

    let app = h.app.clone();
    let watcher = tokio::spawn(async move {
        send(&app, get("/registrations/watch?userId=loc-1&timeoutSecs=10")).await
    });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    h.store
        .update(
            &reg.id,
            RegistrationPatch::stage_completed(Stage::CustomerProfile, "CP7", "done"),
        )
        .await
        .unwrap();

    let (status, body) = watcher.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert_eq!(body["registrations"][0]["customerProfileSid"], "CP7");
}

// ──────────────────────────────────────────────
// Webhooks
// ──────────────────────────────────────────────

#[tokio::test]
async fn brand_webhook_updates_the_linked_registration() {
    let h = harness();
    let reg = h.store.create("loc-1", sample_form()).await.unwrap();
    h.store
        .update(
            &reg.id,
            RegistrationPatch::stage_completed(Stage::BrandRegistration, "BN123", "ok"),
        )
        .await
        .unwrap();

    let (status, body) = send(
        &h.app,
        post_json(
            "/webhooks/a2p/brand",
            &json!({"BrandSid": "BN123", "BrandStatus": "APPROVED"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], json!([reg.id.clone()]));

    let stored = h.store.get_by_id(&reg.id).await.unwrap().unwrap();
    assert_eq!(stored.brand_status.as_deref(), Some("approved"));
}

#[tokio::test]
async fn form_encoded_campaign_webhook_is_accepted() {
    let h = harness();
    let reg = h.store.create("loc-1", sample_form()).await.unwrap();
    h.store
        .update(
            &reg.id,
            RegistrationPatch::stage_completed(Stage::Campaign, "QE1", "ok"),
        )
        .await
        .unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/a2p/campaign")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("CampaignSid=QE1&CampaignStatus=VERIFIED"))
        .unwrap();
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);

    let stored = h.store.get_by_id(&reg.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RegistrationStatus::Approved);
}

#[tokio::test]
async fn unknown_sid_is_acknowledged_and_dumped() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        post_json(
            "/webhooks/a2p/brand",
            &json!({"BrandSid": "BN999", "BrandStatus": "APPROVED"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unmatched"], json!(["BN999"]));

    let (status, dumps) = send(&h.app, get("/webhooks/dumps?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dumps["dumps"][0]["source"], "a2p/brand");
}

#[tokio::test]
async fn messaging_callback_kinds_are_checked() {
    let h = harness();
    let (status, _) = send(
        &h.app,
        post_json("/webhooks/twilio/status", &json!({"MessageSid": "SM1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h.app,
        post_json("/webhooks/twilio/other", &json!({"MessageSid": "SM1"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.store.list_webhook_dumps(0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unparseable_webhook_is_a_400() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/a2p/brand")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ──────────────────────────────────────────────
// Activity
// ──────────────────────────────────────────────

#[tokio::test]
async fn activity_records_the_run() {
    let h = harness();
    send(&h.app, post_json("/a2p", &registration_body("loc-1"))).await;

    let (status, body) = send(&h.app, get("/activity")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"], 20);
    let entries = body["entries"].as_array().unwrap();
    assert!(!entries.is_empty());
    assert_eq!(entries[0]["message"], "All registration stages completed");
}

// ──────────────────────────────────────────────
// Authentication
// ──────────────────────────────────────────────

#[tokio::test]
async fn api_key_is_required_when_configured() {
    let h = harness_with_key(Some("k3y"));

    let (status, _) = send(&h.app, get("/activity")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/activity")
        .header("x-api-key", "nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.app, wrong).await.0, StatusCode::FORBIDDEN);

    let bearer = Request::builder()
        .uri("/activity")
        .header("authorization", "Bearer k3y")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.app, bearer).await.0, StatusCode::OK);

    let (status, _) = send(&h.app, get("/webhooks/dumps")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_callbacks_skip_auth() {
    let h = harness_with_key(Some("k3y"));
    assert_eq!(send(&h.app, get("/health")).await.0, StatusCode::OK);

    let (status, _) = send(
        &h.app,
        post_json("/webhooks/a2p/brand", &json!({"BrandSid": "BN1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
