//! Router-level tests: auth, routing and status codes through the full
//! middleware stack.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, oneshot};
use tokio_test::assert_ok;
use tower::ServiceExt;

use notification_fanout::auth::Claims;
use notification_fanout::config::Settings;
use notification_fanout::push::NoopPushGateway;
use notification_fanout::server::{create_app, serve, AppState, API_KEY_HEADER};
use notification_fanout::storage::Stores;

const SECRET: &str = "http-test-secret";
const API_KEY: &str = "internal-key";

fn test_state() -> AppState {
    let settings: Settings = serde_json::from_value(json!({
        "jwt": { "secret": SECRET },
        "api": { "key": API_KEY }
    }))
    .unwrap();
    AppState::with_components(settings, Stores::memory(), Arc::new(NoopPushGateway))
}

fn token_for(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
        email: None,
        extra: Default::default(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn request(method: Method, uri: &str, user_id: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = assert_ok!(to_bytes(response.into_body(), 1024 * 1024).await);
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_is_public() {
    let app = create_app(test_state());

    let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["push"]["provider"], "noop");
    assert_eq!(body["storage"]["backend"], "memory");
}

#[tokio::test]
async fn test_inbox_requires_a_valid_token() {
    let app = create_app(test_state());

    let (status, body) = send(&app, request(Method::GET, "/api/notifications", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let bad = Request::builder()
        .uri("/api/notifications/unread/count")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, bad).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Query form used by EventSource and WebSocket clients
    let uri = format!("/api/notifications/unread/count?token={}", token_for("u1"));
    let (status, body) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(0));
}

#[tokio::test]
async fn test_internal_create_then_read_flow() {
    let app = create_app(test_state());

    let create = json!({
        "userId": "u1",
        "type": "MOOD_ANALYSIS",
        "title": "감정 분석 결과",
        "message": "calm week"
    });

    // Producer endpoint is guarded by the API key
    let (status, body) = send(&app, request(Method::POST, "/internal/notifications", None, Some(create.clone()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let mut req = request(Method::POST, "/internal/notifications", None, Some(create.clone()));
    req.headers_mut().insert(API_KEY_HEADER, "wrong-key".parse().unwrap());
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A user token does not open the producer routes
    let (status, _) = send(&app, request(Method::POST, "/internal/notifications", Some("u1"), Some(create.clone()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut req = request(Method::POST, "/internal/notifications", None, Some(create));
    req.headers_mut().insert(API_KEY_HEADER, API_KEY.parse().unwrap());
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_i64().unwrap();

    let (status, page) = send(&app, request(Method::GET, "/api/notifications?page=0&size=20", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 1);
    assert_eq!(page["content"][0]["id"], id);
    assert_eq!(page["content"][0]["isRead"], false);
    assert_eq!(page["content"][0]["type"], "MOOD_ANALYSIS");

    let uri = format!("/api/notifications/{}/read", id);
    let (status, _) = send(&app, request(Method::PUT, &uri, Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, request(Method::PUT, &uri, Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request(Method::PUT, &uri, Some("u2"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(&app, request(Method::PUT, "/api/notifications/read-all", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);
}

#[tokio::test]
async fn test_fcm_register_rejects_empty_token() {
    let app = create_app(test_state());

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/notifications/fcm/register", Some("u1"), Some(json!({"token": ""}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/api/notifications/fcm/register",
            Some("u1"),
            Some(json!({"token": "T1", "deviceType": "Android", "browserInfo": "Pixel"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deviceType"], "android");
    assert_eq!(body["isActive"], true);
}

#[tokio::test]
async fn test_settings_round_trip() {
    let app = create_app(test_state());

    let (status, body) = send(&app, request(Method::GET, "/api/notifications/settings", Some("u1"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["diaryReminderTime"], "20:00");
    assert_eq!(body["emailNotificationsEnabled"], false);

    let (status, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/notifications/settings",
            Some("u1"),
            Some(json!({"diaryReminderTime": "07:30", "pushNotificationsEnabled": false})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["diaryReminderTime"], "07:30");
    assert_eq!(body["pushNotificationsEnabled"], false);
    assert_eq!(body["moodAnalysisEnabled"], true);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_app(test_state());

    let response = app
        .oneshot(request(Method::GET, "/metrics", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("fanout_live_sessions"));
}

#[tokio::test]
async fn test_serve_ends_open_streams_then_runs_shutdown() {
    let state = test_state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, mut task_rx) = broadcast::channel(1);
    let (signal_tx, signal_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(serve(listener, state.clone(), shutdown_tx, async move {
        let _ = signal_rx.await;
    }));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "GET /api/notifications/stream HTTP/1.1\r\nHost: {}\r\nAuthorization: Bearer {}\r\nAccept: text/event-stream\r\n\r\n",
        addr,
        token_for("u1")
    );
    stream.write_all(head.as_bytes()).await.unwrap();

    let mut received = String::new();
    let mut buf = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !received.contains("event: connect") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed before connect event");
            received.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
    })
    .await
    .expect("connect event did not arrive");
    assert_eq!(state.channels.stats().sse_sessions, 1);

    signal_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server kept running with an open stream")
        .unwrap()
        .unwrap();
    assert_eq!(result.sessions_closed, 1);
    assert!(result.queue_drained);
    assert!(task_rx.try_recv().is_ok());
    assert_eq!(state.channels.stats().sse_sessions, 0);

    // The stream ends and the listener is gone
    let rest = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    })
    .await;
    assert!(rest.is_ok());
    assert!(TcpStream::connect(addr).await.is_err());
}
