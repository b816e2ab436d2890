//! Decode and routing errors.

use thiserror::Error;

/// Result type for payload decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Reasons a payload on a routed topic was dropped.
///
/// Topics outside the route, or without the payload marker, are not errors;
/// the decoder returns an empty batch for them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Byte 2 holds a node function the bridge does not know.
    #[error("Unknown device type {tag} on {topic}: {payload}")]
    UnknownDeviceType {
        topic: String,
        payload: String,
        tag: u8,
    },

    /// Invalid hex or a payload too short for its declared type.
    #[error("Malformed payload on {topic}: {payload} ({reason})")]
    Malformed {
        topic: String,
        payload: String,
        reason: String,
    },
}

impl DecodeError {
    pub fn topic(&self) -> &str {
        match self {
            Self::UnknownDeviceType { topic, .. } | Self::Malformed { topic, .. } => topic,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Self::UnknownDeviceType { payload, .. } | Self::Malformed { payload, .. } => payload,
        }
    }
}

/// Errors building a topic route.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Invalid route pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Route pattern must have exactly 3 capture groups, found {0}")]
    CaptureGroups(usize),
}
