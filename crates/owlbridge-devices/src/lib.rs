//! Owlbridge device crate.
//!
//! Turns RFM69 gateway MQTT traffic into typed measurements.
//!
//! ## Architecture
//!
//! - **TopicRoute**: matches inbound topics and normalizes the gateway id
//! - **PayloadDecoder**: maps the hex payload of a routed topic onto the node
//!   function layout
//! - **Measurement**: one named, scaled value from one node

pub mod decoder;
pub mod error;
pub mod mdl;
pub mod route;

pub use decoder::PayloadDecoder;
pub use error::{DecodeError, DecodeResult, RouteError};
pub use mdl::{DeviceType, Measurement, MetricValue};
pub use route::{normalize_gateway, RouteMatch, TopicRoute, PAYLOAD_MARKER};
