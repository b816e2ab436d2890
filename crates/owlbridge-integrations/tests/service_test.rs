//! Bridge service tests against in-memory sinks.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use owlbridge_core::{BridgeConfig, HealthState};
use owlbridge_dispatch::{CacheKey, DataPoint};
use owlbridge_integrations::sink::SinkResult;
use owlbridge_integrations::{
    BridgeService, ExecutionReport, InboundMessage, MessagePublisher, PointWriter, SinkError,
};

const TOPIC: &str = "RFM69Gw/RFM69Gw-AA:BB:CC:DD:EE:FF-1/5/payload";
const POWER_SINGLE: &str = "0100012c010f00";

#[derive(Debug, Clone, PartialEq)]
struct Sent {
    topic: String,
    payload: String,
    retain: bool,
}

#[derive(Default)]
struct MockPublisher {
    sent: Mutex<Vec<Sent>>,
    fail_prefix: Mutex<Option<String>>,
}

impl MockPublisher {
    fn failing_on(prefix: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_prefix: Mutex::new(Some(prefix.to_string())),
        }
    }

    fn recover(&self) {
        *self.fail_prefix.lock() = None;
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    fn topics(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.topic).collect()
    }
}

#[async_trait]
impl MessagePublisher for MockPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> SinkResult<()> {
        if let Some(prefix) = self.fail_prefix.lock().as_deref() {
            if topic.starts_with(prefix) {
                return Err(SinkError::Publish("broker gone".to_string()));
            }
        }
        self.sent.lock().push(Sent {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }
}

#[derive(Default)]
struct MockWriter {
    points: Mutex<Vec<DataPoint>>,
    fail: bool,
}

#[async_trait]
impl PointWriter for MockWriter {
    async fn write_points(&self, points: &[DataPoint]) -> SinkResult<()> {
        if self.fail {
            return Err(SinkError::Write("database down".to_string()));
        }
        self.points.lock().extend_from_slice(points);
        Ok(())
    }
}

fn config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.influxdb.enabled = true;
    config.rebroadcast.enabled = true;
    config.rebroadcast.sensor_list = vec![1];
    config.ha_integration.enabled = true;
    config
}

fn service(publisher: &Arc<MockPublisher>, writer: &Arc<MockWriter>) -> BridgeService {
    BridgeService::from_config(
        &config(),
        publisher.clone(),
        Some(writer.clone() as Arc<dyn PointWriter>),
    )
    .unwrap()
}

#[tokio::test]
async fn test_message_reaches_every_sink() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);

    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert_eq!(report.written, 2);
    assert_eq!(report.published, 4);
    assert!(report.is_clean());

    let points = writer.points.lock().clone();
    assert_eq!(points[0].measurement, "power1");
    assert_eq!(points[1].measurement, "vrms");

    assert_eq!(
        publisher.topics(),
        vec![
            "RFM69Bridge/1",
            "homeassistant/sensor/rfm69gw-decoder-AABBCCDDEEFF-1/power1/config",
            "homeassistant/sensor/rfm69gw-decoder-AABBCCDDEEFF-1/vrms/config",
            "rfm69gw-decoder/AABBCCDDEEFF/1",
        ]
    );

    let sent = publisher.sent();
    assert!(!sent[0].retain);
    assert!(sent[1].retain);
    assert_eq!(sent[3].payload, r#"{"power1":300,"vrms":1.5}"#);
}

#[tokio::test]
async fn test_second_message_skips_discovery() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);

    service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;

    assert_eq!(report.published, 2);
    assert_eq!(report.written, 2);
    assert_eq!(publisher.sent().len(), 6);
}

#[tokio::test]
async fn test_unknown_device_type_makes_no_sink_calls() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);

    let report = service.handle_message(TOPIC, b"0100092c010f00").await;
    assert_eq!(report, ExecutionReport::default());
    assert!(publisher.sent().is_empty());
    assert!(writer.points.lock().is_empty());
    assert!(service.dispatcher().cache().is_empty());
}

#[tokio::test]
async fn test_malformed_and_foreign_messages_are_dropped() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);

    service.handle_message(TOPIC, b"not hex").await;
    service.handle_message(TOPIC, b"010001").await;
    service
        .handle_message("RFM69Gw/RFM69Gw-AA:BB:CC:DD:EE:FF-1/5/status", POWER_SINGLE.as_bytes())
        .await;
    service.handle_message("other/topic", POWER_SINGLE.as_bytes()).await;

    assert!(publisher.sent().is_empty());
    assert!(writer.points.lock().is_empty());

    // the loop carries on after bad input
    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert_eq!(report.written, 2);
}

#[tokio::test]
async fn test_failing_writer_does_not_block_publishes() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter {
        fail: true,
        ..Default::default()
    });
    let service = service(&publisher, &writer);

    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert_eq!(report.failed, 2);
    assert_eq!(report.written, 0);
    assert_eq!(report.published, 4);
}

#[tokio::test]
async fn test_failing_rebroadcast_does_not_block_other_sinks() {
    let publisher = Arc::new(MockPublisher::failing_on("RFM69Bridge"));
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);

    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.written, 2);
    assert_eq!(report.published, 3);
    assert!(!publisher.topics().iter().any(|t| t.starts_with("RFM69Bridge")));
}

#[tokio::test]
async fn test_failed_discovery_is_retried_until_delivered() {
    let publisher = Arc::new(MockPublisher::failing_on("homeassistant/"));
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);
    let power = CacheKey::new("AABBCCDDEEFF", 1, "power1");

    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert_eq!(report.failed, 2);
    assert_eq!(report.published, 2);
    assert!(!service.dispatcher().cache().is_announced(&power));

    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert_eq!(report.failed, 2);
    assert_eq!(report.published, 2);

    publisher.recover();
    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert!(report.is_clean());
    assert_eq!(report.published, 4);
    assert!(service.dispatcher().cache().is_announced(&power));
    assert!(service
        .dispatcher()
        .cache()
        .is_announced(&CacheKey::new("AABBCCDDEEFF", 1, "vrms")));

    let report = service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    assert_eq!(report.published, 2);
    let configs = publisher
        .topics()
        .into_iter()
        .filter(|t| t.starts_with("homeassistant/"))
        .count();
    assert_eq!(configs, 2);
}

#[tokio::test]
async fn test_ha_online_replays_state() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);

    service.handle_message(TOPIC, POWER_SINGLE.as_bytes()).await;
    let before = publisher.sent().len();

    let report = service.handle_message("homeassistant/status", b"offline").await;
    assert_eq!(report.published, 0);

    let report = service.handle_message("homeassistant/status", b"online").await;
    assert_eq!(report.published, 1);
    assert_eq!(report.written, 0);

    let sent = publisher.sent();
    assert_eq!(sent.len(), before + 1);
    let replay = sent.last().unwrap();
    assert_eq!(replay.topic, "rfm69gw-decoder/AABBCCDDEEFF/1");
    assert_eq!(replay.payload, r#"{"power1":300,"vrms":1.5}"#);
}

#[tokio::test]
async fn test_announce_availability() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);

    service.announce(false).await;
    assert_eq!(
        publisher.sent(),
        vec![Sent {
            topic: "rfm69gw-decoder/status".to_string(),
            payload: "offline".to_string(),
            retain: true,
        }]
    );
}

#[tokio::test]
async fn test_announce_without_home_assistant() {
    let publisher = Arc::new(MockPublisher::default());
    let service =
        BridgeService::from_config(&BridgeConfig::default(), publisher.clone(), None).unwrap();

    assert_eq!(service.announce(true).await.published, 0);
    assert!(publisher.sent().is_empty());
}

#[tokio::test]
async fn test_run_consumes_until_channel_closes() {
    let publisher = Arc::new(MockPublisher::default());
    let writer = Arc::new(MockWriter::default());
    let service = service(&publisher, &writer);
    let health = HealthState::new();

    let (tx, rx) = mpsc::channel(8);
    for payload in [POWER_SINGLE, "zz", POWER_SINGLE] {
        tx.send(InboundMessage {
            topic: TOPIC.to_string(),
            payload: payload.as_bytes().to_vec(),
        })
        .await
        .unwrap();
    }
    drop(tx);

    service.run(rx, health.clone()).await;

    assert!(!health.is_loop_alive());
    assert_eq!(writer.points.lock().len(), 4);
}

#[test]
fn test_invalid_route_pattern_is_rejected() {
    let mut config = config();
    config.mqtt.regex = "RFM69Gw/(.*)".to_string();
    let publisher: Arc<dyn MessagePublisher> = Arc::new(MockPublisher::default());

    assert!(BridgeService::from_config(&config, publisher, None).is_err());
}
