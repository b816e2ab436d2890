//! Home Assistant MQTT Discovery documents.
//!
//! Each measurement of each node becomes one entity announced on
//! `<prefix>/<component>/<base>-<gateway>-<device>/<measurement>/config`.
//!
//! ## Example
//!
//! ```json
//! // Topic: homeassistant/sensor/rfm69gw-decoder-AABBCCDDEEFF-1/vrms/config
//! {
//!   "availability": [{ "topic": "rfm69gw-decoder/status" }],
//!   "device": {
//!     "identifiers": ["rfm69gw_AABBCCDDEEFF_1"],
//!     "manufacturer": "Owltronics",
//!     "model": "Owlet sensor",
//!     "name": "rfm69gw-decoder_AABBCCDDEEFF_1"
//!   },
//!   "device_class": "voltage",
//!   "enabled_by_default": true,
//!   "name": "AABBCCDDEEFF-1-vrms",
//!   "state_class": "measurement",
//!   "state_topic": "rfm69gw-decoder/AABBCCDDEEFF/1",
//!   "unique_id": "AABBCCDDEEFF_1_vrms",
//!   "unit_of_measurement": "V",
//!   "value_template": "{{ value_json.vrms }}"
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Prefix of the device identifiers announced to Home Assistant.
pub const IDENTIFIER_PREFIX: &str = "rfm69gw";

/// Entity platform a measurement is announced under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Sensor,
    BinarySensor,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
        }
    }
}

/// Static description of a measurement name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorProfile {
    pub component: Component,
    pub device_class: Option<&'static str>,
    pub unit: Option<&'static str>,
}

impl SensorProfile {
    const fn sensor(device_class: &'static str, unit: &'static str) -> Self {
        Self {
            component: Component::Sensor,
            device_class: Some(device_class),
            unit: Some(unit),
        }
    }

    /// Look up the profile of a measurement name.
    pub fn for_measurement(name: &str) -> Self {
        match name {
            "power1" | "power2" | "power3" | "power4" => Self::sensor("power", "W"),
            "vrms" => Self::sensor("voltage", "V"),
            "vbatt" => Self::sensor("voltage", "mV"),
            "temp" => Self::sensor("temperature", "°C"),
            "rh" => Self::sensor("humidity", "%"),
            "pressure" => Self::sensor("pressure", "mbar"),
            "trigger" => Self {
                component: Component::BinarySensor,
                device_class: None,
                unit: None,
            },
            _ => Self {
                component: Component::Sensor,
                device_class: None,
                unit: None,
            },
        }
    }

    pub fn is_binary(&self) -> bool {
        self.component == Component::BinarySensor
    }
}

/// Availability topic entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    pub topic: String,
}

/// Device block shared by every entity of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryDevice {
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
}

/// Discovery config payload for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub availability: Vec<Availability>,
    pub device: DiscoveryDevice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    pub enabled_by_default: bool,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    pub state_topic: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<u8>,
    pub value_template: String,
}

/// Settings that shape discovery topics and documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub base_topic: String,
    pub discovery_prefix: String,
    pub manufacturer: String,
    pub model: String,
}

impl DiscoverySettings {
    /// Topic carrying the merged state of one node.
    pub fn state_topic(&self, gateway: &str, device: u16) -> String {
        format!("{}/{}/{}", self.base_topic, gateway, device)
    }

    /// Topic carrying the bridge's availability.
    pub fn availability_topic(&self) -> String {
        format!("{}/status", self.base_topic)
    }

    /// Retained config topic of one entity.
    pub fn config_topic(&self, gateway: &str, device: u16, measurement: &str) -> String {
        let profile = SensorProfile::for_measurement(measurement);
        format!(
            "{}/{}/{}-{}-{}/{}/config",
            self.discovery_prefix,
            profile.component.as_str(),
            self.base_topic,
            gateway,
            device,
            measurement
        )
    }

    /// Build the config document of one entity.
    pub fn document(&self, gateway: &str, device: u16, measurement: &str) -> DiscoveryDocument {
        let profile = SensorProfile::for_measurement(measurement);
        let binary = profile.is_binary();

        DiscoveryDocument {
            availability: vec![Availability {
                topic: self.availability_topic(),
            }],
            device: DiscoveryDevice {
                identifiers: vec![format!("{}_{}_{}", IDENTIFIER_PREFIX, gateway, device)],
                manufacturer: self.manufacturer.clone(),
                model: self.model.clone(),
                name: format!("{}_{}_{}", self.base_topic, gateway, device),
            },
            device_class: profile.device_class.map(str::to_string),
            enabled_by_default: true,
            name: format!("{}-{}-{}", gateway, device, measurement),
            state_class: (!binary).then(|| "measurement".to_string()),
            state_topic: self.state_topic(gateway, device),
            unique_id: format!("{}_{}_{}", gateway, device, measurement),
            unit_of_measurement: profile.unit.map(str::to_string),
            payload_on: binary.then_some(1),
            payload_off: binary.then_some(0),
            value_template: format!("{{{{ value_json.{} }}}}", measurement),
        }
    }
}
