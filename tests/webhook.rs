//! HTTP-level tests for the webhook server.
//!
//! Run with: cargo test --test webhook

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tempfile::TempDir;
use tower::ServiceExt;

use bancheck::bot::{Database, Dispatcher, Notifier, RateLimiter, SendOutcome, StatusClient, TextFormat};
use bancheck::server::{self, AppState, HEALTH_TEXT};

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, chat_id: i64, text: &str, _format: TextFormat) -> SendOutcome {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        SendOutcome::Sent
    }
}

struct TestApp {
    _dir: TempDir,
    state: Arc<AppState>,
    notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    fn new(cooldown: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let database = Database::new(dir.path().join("bot.db"));
        database.init().unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Dispatcher::new(
            "evileuro",
            RateLimiter::new(cooldown),
            StatusClient::new(None, None).unwrap(),
            notifier.clone(),
        );
        Self {
            _dir: dir,
            state: Arc::new(AppState { database, dispatcher }),
            notifier,
        }
    }

    async fn request(&self, req: Request<Body>) -> (StatusCode, String) {
        let response = server::router(self.state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn post_webhook(&self, body: impl Into<Body>) -> (StatusCode, String) {
        let req = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        self.request(req).await
    }

    fn sent(&self) -> Vec<(i64, String)> {
        self.notifier.sent.lock().unwrap().clone()
    }
}

fn message(chat_id: i64, username: &str, text: &str) -> String {
    serde_json::json!({
        "update_id": 10,
        "message": {
            "message_id": 1,
            "chat": { "id": chat_id, "type": "private" },
            "from": { "id": chat_id, "is_bot": false, "username": username },
            "text": text
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(Duration::ZERO);
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = app.request(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, HEALTH_TEXT);
}

#[tokio::test]
async fn test_malformed_body_acknowledged() {
    let app = TestApp::new(Duration::ZERO);
    for body in ["", "not json", "[]", "{\"message\": 5}"] {
        let (status, text) = app.post_webhook(body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "OK");
    }

    // Past the default body limit
    let (status, text) = app.post_webhook(vec![b'x'; 3 * 1024 * 1024]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "OK");

    assert!(app.sent().is_empty());
}

#[tokio::test]
async fn test_update_without_message_acknowledged() {
    let app = TestApp::new(Duration::ZERO);
    let (status, text) = app.post_webhook(r#"{"update_id": 3}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "OK");
    assert!(app.sent().is_empty());
}

#[tokio::test]
async fn test_start_replies() {
    let app = TestApp::new(Duration::ZERO);
    let (status, text) = app.post_webhook(message(42, "alice", "/start")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "OK");

    let sent = app.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 42);
    assert!(sent[0].1.contains("Evil Ban Checker"));
}

#[tokio::test]
async fn test_phone_check_persists() {
    let app = TestApp::new(Duration::ZERO);
    app.post_webhook(message(42, "alice", "+2348100000000")).await;

    let store = app.state.database.open().unwrap();
    assert_eq!(store.count_users().unwrap(), 1);
    let checks = store.recent_checks(10).unwrap();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].number, "+2348100000000");
}

#[tokio::test]
async fn test_rate_limited_still_ok() {
    let app = TestApp::new(Duration::from_secs(60));
    app.post_webhook(message(42, "alice", "/owner")).await;
    let (status, text) = app.post_webhook(message(42, "alice", "/owner")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "OK");
    assert!(app.sent()[1].1.contains("Slow down"));
}

#[tokio::test]
async fn test_store_failure_still_ok() {
    let dir = TempDir::new().unwrap();
    // Directory does not exist, so every open fails
    let database = Database::new(dir.path().join("missing").join("bot.db"));
    let notifier = Arc::new(RecordingNotifier::default());
    let dispatcher = Dispatcher::new(
        "evileuro",
        RateLimiter::new(Duration::ZERO),
        StatusClient::new(None, None).unwrap(),
        notifier.clone(),
    );
    let state = Arc::new(AppState { database, dispatcher });

    let req = Request::builder()
        .method("POST")
        .uri("/webhook")
        .body(Body::from(message(42, "alice", "/start")))
        .unwrap();
    let response = server::router(state).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_webhook_not_allowed() {
    let app = TestApp::new(Duration::ZERO);
    let req = Request::builder().uri("/webhook").body(Body::empty()).unwrap();
    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
