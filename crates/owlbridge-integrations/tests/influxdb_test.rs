//! InfluxDB connector tests against a local HTTP stub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;

use owlbridge_core::InfluxDbConfig;
use owlbridge_devices::{DeviceType, Measurement, MetricValue};
use owlbridge_dispatch::DataPoint;
use owlbridge_integrations::{InfluxDbWriter, PointWriter, SinkError};

#[derive(Debug, Clone)]
struct Request {
    params: HashMap<String, String>,
    body: String,
}

#[derive(Clone, Default)]
struct Stub {
    requests: Arc<Mutex<Vec<Request>>>,
    calls: Arc<AtomicUsize>,
    // Number of leading calls answered with an error.
    failures: usize,
    status: Option<StatusCode>,
}

impl Stub {
    fn respond(&self) -> StatusCode {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        } else {
            StatusCode::NO_CONTENT
        }
    }
}

async fn handle(
    State(stub): State<Stub>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> StatusCode {
    stub.requests.lock().push(Request { params, body });
    stub.respond()
}

async fn serve(stub: Stub) -> InfluxDbConfig {
    let app = Router::new()
        .route("/write", post(handle))
        .route("/query", post(handle))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    InfluxDbConfig {
        enabled: true,
        address: addr.ip().to_string(),
        port: addr.port(),
        retry_delay_secs: 0,
        timeout_secs: 5,
        ..Default::default()
    }
}

fn points() -> Vec<DataPoint> {
    [
        Measurement::new("gw", 1, DeviceType::PowerSingle, "power1", 300i64),
        Measurement::new("gw", 1, DeviceType::PowerSingle, "vrms", 229.4),
    ]
    .iter()
    .map(DataPoint::from_measurement)
    .collect()
}

#[tokio::test]
async fn test_write_points_as_one_request() {
    let stub = Stub::default();
    let writer = InfluxDbWriter::new(serve(stub.clone()).await).unwrap();

    writer.write_points(&points()).await.unwrap();

    let requests = stub.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].params["db"], "home_iot");
    assert_eq!(requests[0].params["u"], "root");
    assert_eq!(requests[0].params["p"], "root");
    assert_eq!(
        requests[0].body,
        "power1,nodeid=1 value=300i\nvrms,nodeid=1 value=229.4"
    );
}

#[tokio::test]
async fn test_write_rejection_is_reported() {
    let stub = Stub {
        failures: 1,
        status: Some(StatusCode::BAD_REQUEST),
        ..Default::default()
    };
    let writer = InfluxDbWriter::new(serve(stub.clone()).await).unwrap();

    let err = writer.write_points(&points()).await.unwrap_err();
    assert!(matches!(err, SinkError::Write(_)));
}

#[tokio::test]
async fn test_nothing_to_write_sends_nothing() {
    let stub = Stub::default();
    let writer = InfluxDbWriter::new(serve(stub.clone()).await).unwrap();

    let nan = DataPoint::from_measurement(&Measurement::new(
        "gw",
        1,
        DeviceType::TempHumidity,
        "temp",
        MetricValue::Float(f64::NAN),
    ));
    writer.write_points(&[]).await.unwrap();
    writer.write_points(&[nan]).await.unwrap();

    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ensure_database_retries_until_ready() {
    let stub = Stub {
        failures: 2,
        ..Default::default()
    };
    let writer = InfluxDbWriter::new(serve(stub.clone()).await).unwrap();

    writer.ensure_database().await.unwrap();

    let requests = stub.requests.lock().clone();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].params["q"], "CREATE DATABASE \"home_iot\"");
}

#[tokio::test]
async fn test_ensure_database_gives_up_after_max_attempts() {
    let stub = Stub {
        failures: usize::MAX,
        ..Default::default()
    };
    let config = InfluxDbConfig {
        max_attempts: 2,
        ..serve(stub.clone()).await
    };
    let writer = InfluxDbWriter::new(config).unwrap();

    let err = writer.ensure_database().await.unwrap_err();
    assert!(matches!(err, SinkError::Http { status: 500, .. }));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unreachable_database() {
    let config = InfluxDbConfig {
        address: "127.0.0.1".to_string(),
        port: 1,
        max_attempts: 1,
        timeout_secs: 2,
        ..Default::default()
    };
    let writer = InfluxDbWriter::new(config).unwrap();

    let err = writer.ensure_database().await.unwrap_err();
    assert!(matches!(err, SinkError::Request(_)));
}
