//! Owlbridge integrations crate.
//!
//! Connects the decoder and dispatcher to the outside world:
//!
//! - **sink**: sink traits and the executor that runs dispatcher actions
//! - **connectors::mqtt**: broker session, subscriptions and availability
//! - **connectors::influxdb**: time-series writer and database bootstrap
//! - **service**: the per-message decode, dispatch and execute pipeline

pub mod connectors;
pub mod service;
pub mod sink;

pub use connectors::influxdb::InfluxDbWriter;
pub use connectors::mqtt::{InboundMessage, MqttPublisher, MqttSession};
pub use service::BridgeService;
pub use sink::{ActionExecutor, ExecutionReport, MessagePublisher, PointWriter, SinkError};
