//! Inbound topic routing.
//!
//! Gateway topics look like `RFM69Gw/<gateway>/<node>/<marker>`. The route
//! pattern captures those three segments; only topics whose marker contains
//! `payload` carry sensor data.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RouteError;

/// Literal that marks a sensor data topic.
pub const PAYLOAD_MARKER: &str = "payload";

/// Gateway tokens such as `RFM69Gw-AA:BB:CC:DD:EE:FF-1` embed the MAC.
static MAC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*-([0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5})-.*$").expect("static MAC pattern")
});

/// Segments captured from an inbound topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Normalized gateway identifier
    pub gateway: String,
    /// Node hint from the topic, superseded by the id in the payload
    pub node_hint: String,
    pub marker: String,
}

impl RouteMatch {
    /// Whether the topic carries sensor data.
    pub fn is_payload(&self) -> bool {
        self.marker.contains(PAYLOAD_MARKER)
    }
}

/// Compiled route pattern.
#[derive(Debug, Clone)]
pub struct TopicRoute {
    pattern: Regex,
}

impl TopicRoute {
    /// Compile a route pattern with exactly three capture groups.
    pub fn new(pattern: &str) -> Result<Self, RouteError> {
        let pattern = Regex::new(pattern)?;
        let groups = pattern.captures_len() - 1;
        if groups != 3 {
            return Err(RouteError::CaptureGroups(groups));
        }
        Ok(Self { pattern })
    }

    /// Match a topic; `None` when it is outside this route.
    ///
    /// The pattern is anchored at the start of the topic, like a prefix match.
    pub fn parse(&self, topic: &str) -> Option<RouteMatch> {
        let caps = self.pattern.captures(topic)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 {
            return None;
        }

        Some(RouteMatch {
            gateway: normalize_gateway(caps.get(1)?.as_str()),
            node_hint: caps.get(2)?.as_str().to_string(),
            marker: caps.get(3)?.as_str().to_string(),
        })
    }
}

/// Extract an embedded MAC and strip its colons, else keep the raw token.
pub fn normalize_gateway(raw: &str) -> String {
    match MAC_TOKEN.captures(raw).and_then(|caps| caps.get(1)) {
        Some(mac) => mac.as_str().replace(':', ""),
        None => raw.to_string(),
    }
}
