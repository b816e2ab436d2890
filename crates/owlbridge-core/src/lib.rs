//! Owlbridge core crate.
//!
//! Shared configuration, error types and health flags used by every other
//! bridge crate.

pub mod config;
pub mod error;
pub mod health;

pub use config::{
    BridgeConfig, ConfigSource, HassConfig, InfluxDbConfig, MainConfig, MqttConfig,
    RebroadcastConfig,
};
pub use error::{Error, Result};
pub use health::HealthState;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
