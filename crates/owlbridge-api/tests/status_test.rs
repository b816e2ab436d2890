//! Status endpoint tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use owlbridge_api::create_router;
use owlbridge_core::HealthState;

async fn get(health: &HealthState, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = create_router(health.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_status_follows_health() {
    let health = HealthState::new();

    let (status, body) = get(&health, "/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");

    health.set_loop_alive(true);
    health.set_connected(true);
    let (status, body) = get(&health, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["version"], owlbridge_core::VERSION);
    assert!(body["uptime"].is_u64());

    // broker lost
    health.set_connected(false);
    let (status, _) = get(&health, "/status").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _) = get(&HealthState::new(), "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let bind = "127.0.0.1:0".parse().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(owlbridge_api::run(bind, HealthState::new(), async move {
        let _ = rx.await;
    }));
    tx.send(()).unwrap();

    server.await.unwrap().unwrap();
}
