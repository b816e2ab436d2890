//! Gateway payload decoder.
//!
//! Payloads are hex strings of 16-bit words stored low byte first:
//!
//! ```text
//! byte  0..2   node id (u16)
//! byte  2      node function tag (DeviceType)
//! byte  3..    fields of the node function layout
//! ```
//!
//! Power readings are signed, temperatures are signed hundredths, every other
//! field is unsigned. `vrms` is in tenths of a volt, `rh` and `pressure` in
//! hundredths.

use tracing::debug;

use crate::error::{DecodeError, DecodeResult, RouteError};
use crate::mdl::{DeviceType, Measurement, MetricValue};
use crate::route::TopicRoute;

/// Decodes gateway topics and payloads into measurements.
#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    route: TopicRoute,
}

impl PayloadDecoder {
    pub fn new(route: TopicRoute) -> Self {
        Self { route }
    }

    /// Build a decoder from a route pattern.
    pub fn from_pattern(pattern: &str) -> Result<Self, RouteError> {
        Ok(Self::new(TopicRoute::new(pattern)?))
    }

    /// Decode one inbound message.
    ///
    /// Topics outside the route and topics without the payload marker yield
    /// an empty batch.
    pub fn decode(&self, topic: &str, payload_hex: &str) -> DecodeResult<Vec<Measurement>> {
        let Some(route) = self.route.parse(topic) else {
            debug!("Topic outside route: {}", topic);
            return Ok(Vec::new());
        };

        if !route.is_payload() {
            debug!("Not a payload topic: {}", topic);
            return Ok(Vec::new());
        }

        let malformed = |reason: String| DecodeError::Malformed {
            topic: topic.to_string(),
            payload: payload_hex.to_string(),
            reason,
        };

        let bytes = hex::decode(payload_hex).map_err(|e| malformed(e.to_string()))?;
        let reader = PayloadReader::new(&bytes);

        let device = reader.u16_at(0).ok_or_else(|| malformed("missing node id".into()))?;
        let tag = reader.u8_at(2).ok_or_else(|| malformed("missing node function".into()))?;
        let device_type =
            DeviceType::try_from(tag).map_err(|tag| DecodeError::UnknownDeviceType {
                topic: topic.to_string(),
                payload: payload_hex.to_string(),
                tag,
            })?;

        if bytes.len() < device_type.payload_len() {
            return Err(malformed(format!(
                "{} needs {} bytes, got {}",
                device_type,
                device_type.payload_len(),
                bytes.len()
            )));
        }

        let values = decode_fields(device_type, &reader)
            .ok_or_else(|| malformed("payload truncated".into()))?;

        Ok(device_type
            .measurement_names()
            .iter()
            .zip(values)
            .map(|(name, value)| Measurement::new(&route.gateway, device, device_type, *name, value))
            .collect())
    }
}

/// Field values in the order of `DeviceType::measurement_names`.
fn decode_fields(device_type: DeviceType, r: &PayloadReader<'_>) -> Option<Vec<MetricValue>> {
    let values = match device_type {
        DeviceType::PowerSingle => vec![r.power(3)?, r.tenths(5)?],
        DeviceType::PowerDouble => vec![r.power(3)?, r.power(5)?, r.tenths(7)?],
        DeviceType::PowerQuad => vec![
            r.power(3)?,
            r.power(5)?,
            r.power(7)?,
            r.power(9)?,
            r.tenths(11)?,
        ],
        DeviceType::TempHumidity => vec![r.temperature(3)?, r.hundredths(5)?, r.raw(7)?],
        // vbatt shares bytes 7..9 with the upper pressure word
        DeviceType::TempPressure => vec![
            r.temperature(3)?,
            MetricValue::Float(r.u32_at(5)? as f64 / 100.0),
            r.raw(7)?,
        ],
        DeviceType::Trigger => vec![
            MetricValue::Integer(r.u8_at(3)? as i64),
            r.raw(4)?,
        ],
    };
    Some(values)
}

/// Little-endian field access over a decoded payload.
struct PayloadReader<'a> {
    bytes: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn u8_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.bytes.get(offset..offset + 2)?;
        Some(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i16_at(&self, offset: usize) -> Option<i16> {
        self.u16_at(offset).map(|v| v as i16)
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.bytes.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn power(&self, offset: usize) -> Option<MetricValue> {
        self.i16_at(offset).map(|v| MetricValue::Integer(v as i64))
    }

    fn temperature(&self, offset: usize) -> Option<MetricValue> {
        self.i16_at(offset).map(|v| MetricValue::Float(v as f64 / 100.0))
    }

    fn tenths(&self, offset: usize) -> Option<MetricValue> {
        self.u16_at(offset).map(|v| MetricValue::Float(v as f64 / 10.0))
    }

    fn hundredths(&self, offset: usize) -> Option<MetricValue> {
        self.u16_at(offset).map(|v| MetricValue::Float(v as f64 / 100.0))
    }

    fn raw(&self, offset: usize) -> Option<MetricValue> {
        self.u16_at(offset).map(|v| MetricValue::Integer(v as i64))
    }
}
