//! Outbound actions produced by the dispatcher.
//!
//! Actions are plain data. Sinks execute them, each one independently.

use std::collections::BTreeMap;

use serde::Serialize;

use owlbridge_devices::{Measurement, MetricValue};

use crate::cache::CacheKey;

/// One time-series point: `{measurement, tags: {nodeid}, fields: {value}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, MetricValue>,
}

impl DataPoint {
    pub fn from_measurement(m: &Measurement) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("nodeid".to_string(), m.device.to_string());

        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), m.value);

        Self {
            measurement: m.name.clone(),
            tags,
            fields,
        }
    }
}

/// A message for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

impl Publish {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }

    /// Payload parsed as JSON, `None` for plain-text payloads.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.payload).ok()
    }
}

/// Kind of outbound action, for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    DatabaseWrite,
    Rebroadcast,
    Discovery,
    State,
    Availability,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseWrite => write!(f, "database"),
            Self::Rebroadcast => write!(f, "rebroadcast"),
            Self::Discovery => write!(f, "discovery"),
            Self::State => write!(f, "state"),
            Self::Availability => write!(f, "availability"),
        }
    }
}

/// Work for a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundAction {
    /// Write a point to the time-series database.
    DatabaseWrite(DataPoint),
    /// Republish a node's values on the simplified topic.
    Rebroadcast(Publish),
    /// Announce one entity (retained). `key` is marked announced once the
    /// message is handed to the broker.
    Discovery { key: CacheKey, publish: Publish },
    /// Publish a node's merged state.
    State(Publish),
    /// Publish the bridge's `online` / `offline` status (retained).
    Availability(Publish),
}

impl OutboundAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::DatabaseWrite(_) => ActionKind::DatabaseWrite,
            Self::Rebroadcast(_) => ActionKind::Rebroadcast,
            Self::Discovery { .. } => ActionKind::Discovery,
            Self::State(_) => ActionKind::State,
            Self::Availability(_) => ActionKind::Availability,
        }
    }

    /// The broker message, for every action except database writes.
    pub fn publish(&self) -> Option<&Publish> {
        match self {
            Self::DatabaseWrite(_) => None,
            Self::Discovery { publish, .. } => Some(publish),
            Self::Rebroadcast(p) | Self::State(p) | Self::Availability(p) => Some(p),
        }
    }
}
