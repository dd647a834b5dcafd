//! Integration tests: curl backend, retry executor, session guard and monitor
//! against a local stub server.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::stub_server::{closed_port_url, Reply, StubServer};
use docqa_core::api::{BackendApi, Credentials, HttpBackend, ProgressFn, UploadProgress};
use docqa_core::monitor::{
    ConnectionMonitor, HealthProbe, MonitorSettings, OverallHealth, ServerStatus, ServiceStatus,
};
use docqa_core::retry::{
    analyze, run_with_retry, ErrorKind, NetworkFailure, RequestError, RetryPolicy,
};
use docqa_core::session::{authorized, MemoryTokenStore, StoredToken, TokenStore};

const HEALTHY: &str = r#"{
    "status": "ok",
    "timestamp": "2024-05-01T12:00:00Z",
    "services": {
        "qdrant": {"status": "healthy", "response_time_ms": 12.5},
        "gemini": {"status": "healthy", "responseTimeMs": 240}
    }
}"#;

fn backend(server: &StubServer) -> HttpBackend {
    HttpBackend::new(server.base_url())
        .unwrap()
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(2))
        .with_health_check("/health", Duration::from_secs(2))
}

fn fast_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Duration::from_millis(20))
}

#[tokio::test]
async fn health_probe_decodes_report() {
    let server = StubServer::start();
    server.route("GET", "/health", Reply::json(200, HEALTHY));

    let snapshot = backend(&server).check().await.unwrap();
    assert_eq!(snapshot.overall, OverallHealth::Ok);
    assert_eq!(snapshot.timestamp.as_deref(), Some("2024-05-01T12:00:00Z"));
    assert_eq!(snapshot.service("qdrant").unwrap().status, ServiceStatus::Healthy);
    assert_eq!(snapshot.service("gemini").unwrap().response_time_ms, Some(240.0));
}

#[tokio::test]
async fn login_posts_form_credentials() {
    let server = StubServer::start();
    server.route(
        "POST",
        "/auth/jwt/login",
        Reply::json(200, r#"{"access_token":"jwt-123","token_type":"bearer"}"#),
    );

    let creds = Credentials {
        email: "ada@example.com".to_string(),
        password: "p&ss word".to_string(),
    };
    let login = backend(&server).login(&creds).await.unwrap();
    assert_eq!(login.access_token, "jwt-123");

    let sent = server.requests_to("/auth/jwt/login");
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].header("content-type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(sent[0].body_text(), "username=ada%40example.com&password=p%26ss+word");
}

#[tokio::test]
async fn ask_sends_bearer_and_json_query() {
    let server = StubServer::start();
    server.route(
        "POST",
        "/query",
        Reply::json(
            200,
            r#"{"answer":"Forty-two.","source_documents":[{"filename":"guide.pdf","chunk_index":7,"score":0.81}]}"#,
        ),
    );

    let answer = backend(&server)
        .ask("tok", "what is the answer?", Some(Duration::from_secs(3)))
        .await
        .unwrap();
    assert_eq!(answer.answer, "Forty-two.");
    assert_eq!(answer.source_documents[0].filename, "guide.pdf");

    let sent = &server.requests_to("/query")[0];
    assert_eq!(sent.header("authorization"), Some("Bearer tok"));
    let body: serde_json::Value = serde_json::from_slice(&sent.body).unwrap();
    assert_eq!(body["query"], "what is the answer?");
}

#[tokio::test]
async fn upload_sends_multipart_file() {
    let server = StubServer::start();
    server.route(
        "POST",
        "/upload",
        Reply::json(200, r#"{"filename":"notes.txt","num_chunks_stored":3}"#),
    );
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "first line\nsecond line\n").unwrap();

    let progress: Arc<Mutex<Vec<u64>>> = Arc::default();
    let sink = Arc::clone(&progress);
    let on_progress: ProgressFn =
        Arc::new(move |p: UploadProgress| sink.lock().unwrap().push(p.sent));
    let uploaded = backend(&server)
        .upload("tok", &path, Some(on_progress))
        .await
        .unwrap();
    assert_eq!(uploaded.num_chunks_stored, 3);

    let sent = &server.requests_to("/upload")[0];
    assert!(sent
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data"));
    let body = sent.body_text();
    assert!(body.contains(r#"name="file"; filename="notes.txt""#));
    assert!(body.contains("second line"));
}

#[tokio::test]
async fn error_status_carries_backend_detail() {
    let server = StubServer::start();
    server.route(
        "POST",
        "/query",
        Reply::json(
            500,
            r#"{"error":"LLMError","detail":"Language model is unavailable","timestamp":"2024-05-01T12:00:00Z"}"#,
        ),
    );

    let err = backend(&server).ask("tok", "q", None).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    let info = analyze(&err);
    assert_eq!(info.kind, ErrorKind::ServerError);
    assert!(info.can_retry);
    assert_eq!(info.user_message, "Language model is unavailable");
}

#[tokio::test]
async fn unprocessable_entity_is_validation() {
    let server = StubServer::start();
    server.route(
        "POST",
        "/auth/register",
        Reply::json(
            422,
            r#"{"error":"validation_error","message":"Invalid email address","details":{}}"#,
        ),
    );

    let creds = Credentials {
        email: "not-an-email".to_string(),
        password: "x".to_string(),
    };
    let err = backend(&server).register(&creds).await.unwrap_err();
    let info = analyze(&err);
    assert_eq!(info.kind, ErrorKind::Validation);
    assert!(!info.can_retry);
    assert_eq!(info.user_message, "Invalid email address");
}

#[tokio::test]
async fn closed_port_is_retryable_network_error() {
    let api = HttpBackend::new(&closed_port_url()).unwrap();
    let err = api.check().await.unwrap_err();
    assert!(
        matches!(
            err,
            RequestError::Network {
                kind: NetworkFailure::ConnectionRefused,
                ..
            }
        ),
        "got {:?}",
        err
    );
    let info = analyze(&err);
    assert_eq!(info.kind, ErrorKind::Network);
    assert!(info.can_retry);
}

#[tokio::test]
async fn slow_health_endpoint_times_out() {
    let server = StubServer::start();
    server.route(
        "GET",
        "/health",
        Reply::json(200, HEALTHY).delayed(Duration::from_millis(1500)),
    );
    let api = HttpBackend::new(server.base_url())
        .unwrap()
        .with_health_check("/health", Duration::from_millis(200));

    let err = api.check().await.unwrap_err();
    assert!(matches!(err, RequestError::Timeout(_)), "got {:?}", err);
    assert_eq!(analyze(&err).kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn retry_recovers_from_transient_server_error() {
    let server = StubServer::start();
    server
        .route("POST", "/query", Reply::json(503, r#"{"detail":"warming up"}"#))
        .route("POST", "/query", Reply::json(200, r#"{"answer":"ok","sources":[]}"#));
    let api = backend(&server);

    let answer = run_with_retry(&fast_policy(3), || api.ask("tok", "q", None))
        .await
        .unwrap();
    assert_eq!(answer.answer, "ok");
    assert_eq!(server.requests_to("/query").len(), 2);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = StubServer::start();
    server.route("GET", "/users/me", Reply::json(403, r#"{"detail":"Forbidden"}"#));
    let api = backend(&server);

    let err = run_with_retry(&fast_policy(3), || api.current_user("tok"))
        .await
        .unwrap_err();
    assert_eq!(err.attempts(), 1);
    assert_eq!(server.requests_to("/users/me").len(), 1);
}

#[tokio::test]
async fn rejected_token_is_cleared() {
    let server = StubServer::start();
    server.route("GET", "/users/me", Reply::json(401, r#"{"detail":"Unauthorized"}"#));
    let api = backend(&server);
    let store = MemoryTokenStore::with_token(StoredToken::new("stale"));

    let err = authorized(&store, &fast_policy(3), |token| {
        let api = &api;
        async move { api.current_user(&token).await }
    })
    .await
    .unwrap_err();
    assert_eq!(err.error().status(), Some(401));
    assert!(store.get_token().is_none());
    assert_eq!(
        server.requests_to("/users/me")[0].header("authorization"),
        Some("Bearer stale")
    );
}

#[tokio::test]
async fn monitor_tracks_backend_through_outage() {
    let server = StubServer::start();
    server
        .route("GET", "/health", Reply::json(200, HEALTHY))
        .route("GET", "/health", Reply::json(503, r#"{"detail":"maintenance"}"#))
        .route("GET", "/health", Reply::json(200, HEALTHY));

    let settings = MonitorSettings {
        base_interval: Duration::from_secs(10),
        max_interval: Duration::from_secs(60),
        probe_timeout: Duration::from_secs(2),
    };
    let monitor = ConnectionMonitor::new(settings, Arc::new(backend(&server)));
    let seen: Arc<Mutex<Vec<ServerStatus>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let _sub = monitor.subscribe_health(move |view| sink.lock().unwrap().push(view.status));

    monitor.force_check().await;
    assert_eq!(monitor.server_status(), ServerStatus::Online);
    assert!(monitor.health_snapshot().unwrap().is_ok());

    monitor.force_check().await;
    assert_eq!(monitor.server_status(), ServerStatus::Offline);
    assert!(monitor.health_snapshot().is_none());
    assert_eq!(monitor.last_probe_error().unwrap().status, Some(503));
    assert_eq!(monitor.next_poll_interval(), Duration::from_secs(20));

    monitor.force_check().await;
    assert_eq!(monitor.server_status(), ServerStatus::Online);
    assert_eq!(monitor.next_poll_interval(), Duration::from_secs(10));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ServerStatus::Checking,
            ServerStatus::Online,
            ServerStatus::Checking,
            ServerStatus::Offline,
            ServerStatus::Checking,
            ServerStatus::Online,
        ]
    );
    assert_eq!(server.requests_to("/health").len(), 3);
}
