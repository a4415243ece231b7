use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use motorhub_api::{AppStateInner, router};
use motorhub_chat::{BlockingPolicy, ChatCoordinator, ChatStats, ModerationReportBuilder, NullNotifier};
use motorhub_db::Database;
use motorhub_files::{FileDedupStore, FsBlobStore, LocalFileCache};
use motorhub_gateway::{Dispatcher, MessageChannel};
use motorhub_types::api::Claims;

const SECRET: &str = "test-secret";
const THREAD: &str = "/cars/car42/threads/B/A";

async fn app() -> (Router, std::path::PathBuf) {
    let root = std::env::temp_dir().join(format!("motorhub-api-{}", uuid::Uuid::new_v4()));
    let db = Arc::new(Database::open_in_memory().unwrap());
    let device_db = Arc::new(Database::open_in_memory().unwrap());

    let channel = MessageChannel::new(db.clone(), Dispatcher::new());
    let blobs = Arc::new(FsBlobStore::new(root.join("blobs"), "file:///blobs").await.unwrap());
    let files = Arc::new(FileDedupStore::new(db.clone(), blobs));
    let cache = Arc::new(LocalFileCache::new(files.clone(), device_db, root.join("media")));
    let stats = Arc::new(ChatStats::new());

    let chat = ChatCoordinator::new(
        channel.clone(),
        BlockingPolicy::new(db.clone()),
        files,
        cache,
        Arc::new(NullNotifier),
        stats.clone(),
    );
    let reports = ModerationReportBuilder::new(Arc::new(channel), db, stats);

    let state = Arc::new(AppStateInner {
        chat: Arc::new(chat),
        reports: Arc::new(reports),
        jwt_secret: SECRET.into(),
    });
    (router(state), root)
}

fn token(sub: &str, staff: bool) -> String {
    let claims = Claims {
        sub: sub.into(),
        staff,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        let staff = user == "staff";
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user, staff)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_missing_or_bad_token_is_rejected() {
    let (app, root) = app().await;

    let (status, _) = call(&app, request("GET", &format!("{THREAD}/messages"), None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri(format!("{THREAD}/messages"))
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[tokio::test]
async fn test_send_then_open_marks_read() {
    let (app, root) = app().await;

    let (status, body) = call(
        &app,
        request("POST", &format!("{THREAD}/messages"), Some("B"), Some(json!({ "content": "still available?" }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "sent");
    assert_eq!(body["message"]["sender_id"], "u:B");
    assert_eq!(body["message"]["receiver_id"], "u:A");

    let (status, body) = call(&app, request("GET", &format!("{THREAD}/messages"), Some("A"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "still available?");
    assert_eq!(messages[0]["status"], "read");
    assert!(body["failed"].as_array().unwrap().is_empty());

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[tokio::test]
async fn test_outsider_cannot_touch_thread() {
    let (app, root) = app().await;

    let (status, body) = call(
        &app,
        request("POST", &format!("{THREAD}/messages"), Some("Z"), Some(json!({ "content": "hi" }))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, request("GET", &format!("{THREAD}/messages"), Some("Z"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[tokio::test]
async fn test_malformed_paths_and_bodies_are_bad_requests() {
    let (app, root) = app().await;

    let (status, _) = call(
        &app,
        request("GET", "/cars/car42/threads/support:nobody/A/messages", Some("A"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // An encoded slash would smuggle an extra segment into the thread path
    let (status, _) = call(
        &app,
        request("GET", "/cars/car%2F42/threads/B/A/messages", Some("A"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        request("POST", &format!("{THREAD}/messages"), Some("A"), Some(json!({ "content": "   " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        request("POST", &format!("{THREAD}/messages/not-a-uuid/read"), Some("A"), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[tokio::test]
async fn test_report_listing_is_staff_only() {
    let (app, root) = app().await;

    call(
        &app,
        request("POST", &format!("{THREAD}/messages"), Some("B"), Some(json!({ "content": "send a deposit first" }))),
    )
    .await;
    let (status, report) = call(
        &app,
        request(
            "POST",
            &format!("{THREAD}/reports"),
            Some("A"),
            Some(json!({ "reported_user_id": "u:B", "comment": "scam" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["messages"].as_array().unwrap().len(), 1);

    let (status, _) = call(&app, request("GET", "/reports", Some("A"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = call(&app, request("GET", "/reports", Some("staff"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let id = report["id"].as_str().unwrap();
    let (status, _) = call(&app, request("POST", &format!("/reports/{id}/revised"), Some("staff"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let _ = tokio::fs::remove_dir_all(root).await;
}

#[tokio::test]
async fn test_block_round_trip_over_http() {
    let (app, root) = app().await;

    let (status, body) = call(&app, request("POST", "/cars/car42/blocks/B", Some("A"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], true);

    let (status, _) = call(&app, request("POST", "/cars/car42/blocks/A", Some("A"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, request("DELETE", "/cars/car42/blocks/B", Some("A"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], false);

    let _ = tokio::fs::remove_dir_all(root).await;
}
