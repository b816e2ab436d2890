//! MQTT connector using rumqttc.
//!
//! One session serves both directions: the event loop task forwards inbound
//! publishes to a channel, and [`MqttPublisher`] sends the dispatcher's
//! messages. Subscriptions and the availability birth message are re-sent on
//! every ConnAck, so a broker restart needs no special handling.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use owlbridge_core::{BridgeConfig, HealthState};
use owlbridge_dispatch::dispatcher::{AVAILABILITY_OFFLINE, AVAILABILITY_ONLINE};

use crate::sink::{MessagePublisher, SinkError, SinkResult};

/// Capacity of the client request queue.
const REQUEST_CAPACITY: usize = 64;
/// Capacity of the inbound message channel.
const INBOUND_CAPACITY: usize = 256;
/// rumqttc rejects shorter keep-alive intervals.
const MIN_KEEP_ALIVE_SECS: u64 = 5;

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Build the client options: credentials, keep-alive and, with Home
/// Assistant enabled, a retained `offline` last will.
pub fn mqtt_options(config: &BridgeConfig) -> MqttOptions {
    let mqtt = &config.mqtt;
    let mut opts = MqttOptions::new(mqtt.client_id.clone(), mqtt.address.clone(), mqtt.port);
    opts.set_keep_alive(Duration::from_secs(mqtt.keep_alive.max(MIN_KEEP_ALIVE_SECS)));

    if let Some(user) = &mqtt.user {
        opts.set_credentials(user.clone(), mqtt.password.clone().unwrap_or_default());
    }

    if config.ha_integration.enabled {
        opts.set_last_will(LastWill::new(
            config.ha_integration.availability_topic(),
            AVAILABILITY_OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));
    }

    opts
}

/// Topic filters subscribed on every connect.
pub fn subscriptions(config: &BridgeConfig) -> Vec<String> {
    let mut topics = vec![config.mqtt.topic.clone()];
    if config.ha_integration.enabled {
        topics.push(config.ha_integration.ha_status_topic.clone());
    }
    topics
}

/// Publishing half of a session.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Ask the event loop to send DISCONNECT.
    pub async fn disconnect(&self) -> SinkResult<()> {
        self.client.disconnect().await.map_err(closed)
    }
}

// The client hands requests back once its event loop is gone.
fn closed(e: ClientError) -> SinkError {
    debug!(category = "mqtt", "Request rejected by client: {}", e);
    SinkError::NotConnected
}

#[async_trait]
impl MessagePublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> SinkResult<()> {
        let qos = if retain {
            QoS::AtLeastOnce
        } else {
            QoS::AtMostOnce
        };
        self.client
            .publish(topic, qos, retain, payload.as_bytes().to_vec())
            .await
            .map_err(closed)
    }
}

/// A running broker session.
pub struct MqttSession {
    pub publisher: MqttPublisher,
    pub inbound: mpsc::Receiver<InboundMessage>,
    pub task: JoinHandle<()>,
}

impl MqttSession {
    /// Spawn the event loop. Connecting happens in the background and is
    /// retried every `reconnect_delay_secs` until [`MqttPublisher::disconnect`]
    /// is called.
    pub fn start(config: &BridgeConfig, health: HealthState) -> Self {
        let (client, event_loop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
        let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);

        info!(
            category = "mqtt",
            "Connecting to broker at {}",
            config.mqtt.broker_addr()
        );

        let state = LoopState {
            client: client.clone(),
            subscriptions: subscriptions(config),
            availability_topic: config
                .ha_integration
                .enabled
                .then(|| config.ha_integration.availability_topic()),
            reconnect_delay: Duration::from_secs(config.mqtt.reconnect_delay_secs),
            health,
            tx,
        };
        let task = tokio::spawn(state.run(event_loop));

        Self {
            publisher: MqttPublisher { client },
            inbound,
            task,
        }
    }
}

struct LoopState {
    client: AsyncClient,
    subscriptions: Vec<String>,
    availability_topic: Option<String>,
    reconnect_delay: Duration,
    health: HealthState,
    tx: mpsc::Sender<InboundMessage>,
}

impl LoopState {
    async fn run(self, mut event_loop: EventLoop) {
        let mut disconnecting = false;

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(category = "mqtt", "Connected to broker");
                    self.health.set_connected(true);
                    self.on_connect();
                }
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    trace!("Received {} ({} bytes)", p.topic, p.payload.len());
                    let msg = InboundMessage {
                        topic: p.topic,
                        payload: p.payload.to_vec(),
                    };
                    if self.tx.send(msg).await.is_err() {
                        debug!("Inbound receiver closed, dropping message");
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!(category = "mqtt", "Disconnecting from broker");
                    disconnecting = true;
                }
                Ok(_) => {}
                Err(e) => {
                    self.health.set_connected(false);
                    if disconnecting {
                        break;
                    }
                    warn!(
                        category = "mqtt",
                        "Broker connection error: {}. Reconnecting in {}s",
                        e,
                        self.reconnect_delay.as_secs()
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }

        self.health.set_connected(false);
    }

    // Runs inside the polling task, so requests must not wait on the queue.
    fn on_connect(&self) {
        for topic in &self.subscriptions {
            match self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                Ok(()) => info!(category = "mqtt", "Subscribed to {}", topic),
                Err(e) => warn!(category = "mqtt", "Failed to subscribe to {}: {}", topic, e),
            }
        }

        if let Some(topic) = &self.availability_topic {
            if let Err(e) = self.client.try_publish(
                topic.as_str(),
                QoS::AtLeastOnce,
                true,
                AVAILABILITY_ONLINE,
            ) {
                warn!(category = "mqtt", "Failed to publish availability: {}", e);
            }
        }
    }
}
