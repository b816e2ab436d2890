//! Measurement model for gateway telemetry.
//!
//! A decoded payload becomes an ordered list of [`Measurement`]s, one per
//! named field of the node's layout.

use serde::{Deserialize, Serialize};

/// Node function tag carried in byte 2 of every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceType {
    PowerSingle = 1,
    PowerDouble = 2,
    PowerQuad = 3,
    TempHumidity = 4,
    TempPressure = 5,
    Trigger = 6,
}

impl DeviceType {
    /// Number of payload bytes the layout needs, header included.
    pub fn payload_len(&self) -> usize {
        match self {
            Self::PowerSingle => 7,
            Self::PowerDouble => 9,
            Self::PowerQuad => 13,
            Self::TempHumidity => 9,
            Self::TempPressure => 9,
            Self::Trigger => 6,
        }
    }

    /// Measurement names in payload order.
    pub fn measurement_names(&self) -> &'static [&'static str] {
        match self {
            Self::PowerSingle => &["power1", "vrms"],
            Self::PowerDouble => &["power1", "power2", "vrms"],
            Self::PowerQuad => &["power1", "power2", "power3", "power4", "vrms"],
            Self::TempHumidity => &["temp", "rh", "vbatt"],
            Self::TempPressure => &["temp", "pressure", "vbatt"],
            Self::Trigger => &["trigger", "vbatt"],
        }
    }
}

impl TryFrom<u8> for DeviceType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(Self::PowerSingle),
            2 => Ok(Self::PowerDouble),
            3 => Ok(Self::PowerQuad),
            4 => Ok(Self::TempHumidity),
            5 => Ok(Self::TempPressure),
            6 => Ok(Self::Trigger),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PowerSingle => write!(f, "power_single"),
            Self::PowerDouble => write!(f, "power_double"),
            Self::PowerQuad => write!(f, "power_quad"),
            Self::TempHumidity => write!(f, "temp_humidity"),
            Self::TempPressure => write!(f, "temp_pressure"),
            Self::Trigger => write!(f, "trigger"),
        }
    }
}

/// Value of a single measurement.
///
/// Raw counters stay integers and scaled readings are floats, so a given
/// measurement name always keeps the same type downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
}

impl MetricValue {
    /// JSON number for state and rebroadcast payloads.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Integer(v) => serde_json::Value::from(*v),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One named reading from one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Gateway identifier, MAC without separators when one was found
    pub gateway: String,
    /// Node id on the radio network
    pub device: u16,
    pub device_type: DeviceType,
    /// Measurement name, e.g. `power1` or `temp`
    pub name: String,
    pub value: MetricValue,
}

impl Measurement {
    pub fn new(
        gateway: impl Into<String>,
        device: u16,
        device_type: DeviceType,
        name: impl Into<String>,
        value: impl Into<MetricValue>,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            device,
            device_type,
            name: name.into(),
            value: value.into(),
        }
    }
}
