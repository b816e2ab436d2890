//! Measurement dispatcher.
//!
//! Turns the measurements of one inbound message into sink actions:
//!
//! ```text
//! batch ──┬─▶ DatabaseWrite   one point per measurement
//!         ├─▶ Rebroadcast     one message per allow-listed node
//!         ├─▶ Discovery       one retained config per unannounced entity
//!         └─▶ State           one merged message per node
//! ```
//!
//! The dispatcher performs no I/O; it only records values in the provisioning
//! cache. Entities are marked announced by the executor, after the broker
//! accepted their discovery message.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use owlbridge_core::BridgeConfig;
use owlbridge_devices::Measurement;

use crate::action::{DataPoint, OutboundAction, Publish};
use crate::cache::{CacheKey, ProvisioningCache};
use crate::discovery::DiscoverySettings;

/// Payload Home Assistant sends on its status topic when it starts.
pub const HA_ONLINE: &str = "online";
/// Availability payloads of the bridge itself.
pub const AVAILABILITY_ONLINE: &str = "online";
pub const AVAILABILITY_OFFLINE: &str = "offline";

/// Rebroadcast sink settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebroadcastSettings {
    pub topic: String,
    pub allow_list: BTreeSet<u16>,
}

/// Which sinks are enabled and how they are addressed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchSettings {
    pub database: bool,
    pub rebroadcast: Option<RebroadcastSettings>,
    pub discovery: Option<DiscoverySettings>,
}

impl From<&BridgeConfig> for DispatchSettings {
    fn from(config: &BridgeConfig) -> Self {
        let rebroadcast = config.rebroadcast.enabled.then(|| RebroadcastSettings {
            topic: config.rebroadcast.topic.clone(),
            allow_list: config.rebroadcast.sensor_list.iter().copied().collect(),
        });

        let hass = &config.ha_integration;
        let discovery = hass.enabled.then(|| DiscoverySettings {
            base_topic: hass.base_topic.clone(),
            discovery_prefix: hass.discovery_prefix.clone(),
            manufacturer: hass.manufacturer.clone(),
            model: hass.model.clone(),
        });

        Self {
            database: config.influxdb.enabled,
            rebroadcast,
            discovery,
        }
    }
}

/// Maps measurement batches onto sink actions.
pub struct Dispatcher {
    settings: DispatchSettings,
    cache: Arc<ProvisioningCache>,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings, cache: Arc<ProvisioningCache>) -> Self {
        Self { settings, cache }
    }

    pub fn cache(&self) -> &Arc<ProvisioningCache> {
        &self.cache
    }

    /// Actions for the measurements of one inbound message.
    ///
    /// Order: database writes, rebroadcasts, discovery configs, states.
    pub fn dispatch(&self, batch: &[Measurement]) -> Vec<OutboundAction> {
        let mut actions = Vec::new();
        if batch.is_empty() {
            return actions;
        }

        if self.settings.database {
            actions.extend(
                batch
                    .iter()
                    .map(|m| OutboundAction::DatabaseWrite(DataPoint::from_measurement(m))),
            );
        }

        if let Some(rebroadcast) = &self.settings.rebroadcast {
            self.rebroadcast(rebroadcast, batch, &mut actions);
        }

        if let Some(discovery) = &self.settings.discovery {
            self.provision(discovery, batch, &mut actions);
        }

        actions
    }

    fn rebroadcast(
        &self,
        settings: &RebroadcastSettings,
        batch: &[Measurement],
        actions: &mut Vec<OutboundAction>,
    ) {
        let mut by_device: BTreeMap<u16, Map<String, Value>> = BTreeMap::new();
        for m in batch {
            by_device
                .entry(m.device)
                .or_default()
                .insert(m.name.clone(), m.value.to_json());
        }

        for (device, values) in by_device {
            if !settings.allow_list.contains(&device) {
                continue;
            }
            let topic = format!("{}/{}", settings.topic, device);
            debug!("Rebroadcasting {} {:?}", topic, values);
            actions.push(OutboundAction::Rebroadcast(Publish::new(
                topic,
                Value::Object(values).to_string(),
            )));
        }
    }

    fn provision(
        &self,
        settings: &DiscoverySettings,
        batch: &[Measurement],
        actions: &mut Vec<OutboundAction>,
    ) {
        let mut states: BTreeMap<String, Map<String, Value>> = BTreeMap::new();

        for m in batch {
            let key = CacheKey::from(m);
            self.cache.record_seen(&key, m.value);

            if !self.cache.is_announced(&key) {
                debug!(
                    "Announcing sensor {} / {} / {}",
                    m.gateway, m.device, m.name
                );
                let document = settings.document(&m.gateway, m.device, &m.name);
                match serde_json::to_string(&document) {
                    Ok(payload) => {
                        let topic = settings.config_topic(&m.gateway, m.device, &m.name);
                        actions.push(OutboundAction::Discovery {
                            key: key.clone(),
                            publish: Publish::new(topic, payload).retained(),
                        });
                    }
                    Err(e) => warn!("Failed to serialize discovery config for {:?}: {}", key, e),
                }
            }

            states
                .entry(settings.state_topic(&m.gateway, m.device))
                .or_default()
                .insert(m.name.clone(), m.value.to_json());
        }

        actions.extend(state_actions(states));
    }

    /// State actions replaying every cached value, without re-announcing.
    pub fn replay_state(&self) -> Vec<OutboundAction> {
        let Some(settings) = &self.settings.discovery else {
            return Vec::new();
        };

        let mut states: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
        for (key, value) in self.cache.snapshot() {
            states
                .entry(settings.state_topic(&key.gateway, key.device))
                .or_default()
                .insert(key.measurement, value.to_json());
        }

        debug!("Replaying {} state topics", states.len());
        state_actions(states)
    }

    /// React to a message on the Home Assistant status topic.
    pub fn handle_ha_status(&self, payload: &str) -> Vec<OutboundAction> {
        if payload.trim() == HA_ONLINE {
            self.replay_state()
        } else {
            debug!("Ignoring Home Assistant status {:?}", payload);
            Vec::new()
        }
    }

    /// Retained availability message of the bridge, when discovery is enabled.
    pub fn availability(&self, online: bool) -> Option<OutboundAction> {
        let settings = self.settings.discovery.as_ref()?;
        let payload = if online {
            AVAILABILITY_ONLINE
        } else {
            AVAILABILITY_OFFLINE
        };
        Some(OutboundAction::Availability(
            Publish::new(settings.availability_topic(), payload).retained(),
        ))
    }
}

fn state_actions(states: BTreeMap<String, Map<String, Value>>) -> Vec<OutboundAction> {
    states
        .into_iter()
        .map(|(topic, values)| {
            OutboundAction::State(Publish::new(topic, Value::Object(values).to_string()))
        })
        .collect()
}
