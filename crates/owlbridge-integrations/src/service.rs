//! Bridge service: the per-message pipeline.
//!
//! Each inbound message is routed to one of two paths:
//! - the Home Assistant status topic replays cached state on `online`
//! - everything else is decoded, dispatched and executed
//!
//! Messages are handled one at a time in arrival order. Nothing that goes
//! wrong with a single message stops the loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use owlbridge_core::{BridgeConfig, HealthState};
use owlbridge_devices::{DecodeError, PayloadDecoder, RouteError};
use owlbridge_dispatch::{Dispatcher, ProvisioningCache};

use crate::connectors::mqtt::InboundMessage;
use crate::sink::{ActionExecutor, ExecutionReport, MessagePublisher, PointWriter};

pub struct BridgeService {
    decoder: PayloadDecoder,
    dispatcher: Dispatcher,
    executor: ActionExecutor,
    ha_status_topic: Option<String>,
}

impl BridgeService {
    pub fn new(
        decoder: PayloadDecoder,
        dispatcher: Dispatcher,
        executor: ActionExecutor,
        ha_status_topic: Option<String>,
    ) -> Self {
        Self {
            decoder,
            dispatcher,
            executor,
            ha_status_topic,
        }
    }

    /// Wire a service from configuration and the given sinks.
    pub fn from_config(
        config: &BridgeConfig,
        publisher: Arc<dyn MessagePublisher>,
        writer: Option<Arc<dyn PointWriter>>,
    ) -> Result<Self, RouteError> {
        let decoder = PayloadDecoder::from_pattern(&config.mqtt.regex)?;
        let cache = Arc::new(ProvisioningCache::new());
        let dispatcher = Dispatcher::new(config.into(), cache.clone());
        let ha_status_topic = config
            .ha_integration
            .enabled
            .then(|| config.ha_integration.ha_status_topic.clone());

        Ok(Self::new(
            decoder,
            dispatcher,
            ActionExecutor::new(publisher, writer).with_cache(cache),
            ha_status_topic,
        ))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle one inbound message.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> ExecutionReport {
        let text = String::from_utf8_lossy(payload);

        if self.ha_status_topic.as_deref() == Some(topic) {
            info!("Home Assistant status: {}", text.trim());
            let actions = self.dispatcher.handle_ha_status(&text);
            return self.executor.execute(actions).await;
        }

        let measurements = match self.decoder.decode(topic, text.trim()) {
            Ok(measurements) => measurements,
            Err(e) => {
                log_decode_error(&e);
                return ExecutionReport::default();
            }
        };

        if measurements.is_empty() {
            return ExecutionReport::default();
        }
        debug!("Decoded {} measurements from {}", measurements.len(), topic);

        let actions = self.dispatcher.dispatch(&measurements);
        self.executor.execute(actions).await
    }

    /// Publish the bridge's availability, when Home Assistant is enabled.
    pub async fn announce(&self, online: bool) -> ExecutionReport {
        match self.dispatcher.availability(online) {
            Some(action) => self.executor.execute(vec![action]).await,
            None => ExecutionReport::default(),
        }
    }

    /// Consume inbound messages until the channel closes.
    pub async fn run(&self, mut inbound: mpsc::Receiver<InboundMessage>, health: HealthState) {
        health.set_loop_alive(true);
        info!("Message loop started");

        while let Some(msg) = inbound.recv().await {
            let report = self.handle_message(&msg.topic, &msg.payload).await;
            if !report.is_clean() {
                warn!(
                    "{} of {} actions failed for {}",
                    report.failed,
                    report.failed + report.published + report.written,
                    msg.topic
                );
            }
        }

        health.set_loop_alive(false);
        info!("Message loop stopped");
    }
}

fn log_decode_error(e: &DecodeError) {
    match e {
        DecodeError::UnknownDeviceType { .. } => warn!("Dropping message: {}", e),
        DecodeError::Malformed { .. } => error!("Dropping message: {}", e),
    }
}
