//! Bridge configuration.
//!
//! Configuration is read once at startup from a TOML file and handed to each
//! component as an immutable value. Sources are tried in priority order:
//! 1. an explicit path (`--config`)
//! 2. the `OWLBRIDGE_CONFIG` environment variable
//! 3. `/app/owlbridge.toml`
//! 4. built-in defaults
//!
//! Every field has a default, so a file only needs the keys it overrides.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Default configuration file shipped with the bridge.
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Path probed when no explicit configuration is given.
pub const DEFAULT_CONFIG_PATH: &str = "/app/owlbridge.toml";

/// Environment variable names.
pub mod env_vars {
    pub const CONFIG_PATH: &str = "OWLBRIDGE_CONFIG";
    pub const LOG_JSON: &str = "OWLBRIDGE_LOG_JSON";
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub main: MainConfig,
    pub mqtt: MqttConfig,
    pub influxdb: InfluxDbConfig,
    pub rebroadcast: RebroadcastConfig,
    pub ha_integration: HassConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Address the status endpoint binds to.
    pub api_host: String,
    /// Port of the status endpoint.
    pub api_port: u16,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            log_level: "error".to_string(),
            api_host: "127.0.0.1".to_string(),
            api_port: 5000,
        }
    }
}

/// Broker connection and inbound routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub address: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Subscription filter for gateway traffic.
    pub topic: String,
    /// Route pattern with exactly three capture groups: gateway, node hint, marker.
    pub regex: String,
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
    /// Delay before the next connection attempt after a transport error.
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            address: "192.168.0.254".to_string(),
            port: 1883,
            user: None,
            password: None,
            topic: "RFM69Gw/+/+/+".to_string(),
            regex: "RFM69Gw/([^/]+)/([^/]+)/([^/]+)".to_string(),
            client_id: "RFM69GwToInfluxDBBridge".to_string(),
            keep_alive: 60,
            reconnect_delay_secs: 5,
        }
    }
}

impl MqttConfig {
    /// Get the full broker address.
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Time-series database sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxDbConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Delay between database bootstrap attempts.
    pub retry_delay_secs: u64,
    /// Bootstrap attempts before giving up, 0 retries forever.
    pub max_attempts: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "192.168.0.254".to_string(),
            port: 8086,
            user: "root".to_string(),
            password: "root".to_string(),
            database: "home_iot".to_string(),
            retry_delay_secs: 5,
            max_attempts: 0,
            timeout_secs: 10,
        }
    }
}

impl InfluxDbConfig {
    /// Get the HTTP base URL of the database.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

/// Simplified rebroadcast sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebroadcastConfig {
    pub enabled: bool,
    /// Device ids that are republished; all others are skipped.
    pub sensor_list: Vec<u16>,
    pub topic: String,
}

impl Default for RebroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sensor_list: Vec::new(),
            topic: "RFM69Bridge".to_string(),
        }
    }
}

/// Home Assistant discovery and state sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HassConfig {
    pub enabled: bool,
    /// Prefix of state and availability topics.
    pub base_topic: String,
    /// Topic on which Home Assistant announces `online` / `offline`.
    pub ha_status_topic: String,
    pub discovery_prefix: String,
    pub manufacturer: String,
    pub model: String,
}

impl Default for HassConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_topic: "rfm69gw-decoder".to_string(),
            ha_status_topic: "homeassistant/status".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            manufacturer: "Owltronics".to_string(),
            model: "Owlet sensor".to_string(),
        }
    }
}

impl HassConfig {
    /// Topic carrying the bridge's own `online` / `offline` availability.
    pub fn availability_topic(&self) -> String {
        format!("{}/status", self.base_topic)
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Detect the configuration source.
    ///
    /// Explicit and environment paths are returned even when missing so that
    /// loading fails loudly instead of silently running on defaults.
    pub fn detect(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return ConfigSource::File(path.to_path_buf());
        }

        if let Ok(path) = std::env::var(env_vars::CONFIG_PATH) {
            if !path.is_empty() {
                return ConfigSource::File(PathBuf::from(path));
            }
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return ConfigSource::File(default_path.to_path_buf());
        }

        ConfigSource::Defaults
    }

    /// Report the source once logging is up.
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                info!(category = "config", "Loaded config from: {}", path.display())
            }
            ConfigSource::Defaults => warn!(
                category = "config",
                "No config file found, using built-in defaults"
            ),
        }
    }
}

impl BridgeConfig {
    /// Load and validate the configuration from a detected source.
    pub fn load(source: &ConfigSource) -> Result<Self> {
        let config = match source {
            ConfigSource::File(path) => Self::from_file(path)?,
            ConfigSource::Defaults => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file without validating it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Check values that would only fail later at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.main.api_port == 0 {
            return Err(Error::InvalidConfiguration(
                "main.api_port must not be 0".to_string(),
            ));
        }

        let route = Regex::new(&self.mqtt.regex).map_err(|e| {
            Error::InvalidConfiguration(format!("mqtt.regex is not a valid pattern: {}", e))
        })?;
        // captures_len counts the implicit whole-match group
        if route.captures_len() != 4 {
            return Err(Error::InvalidConfiguration(format!(
                "mqtt.regex must have exactly 3 capture groups, found {}",
                route.captures_len() - 1
            )));
        }

        if self.ha_integration.enabled && self.ha_integration.base_topic.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "ha_integration.base_topic must not be empty".to_string(),
            ));
        }

        if self.rebroadcast.enabled && self.rebroadcast.topic.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "rebroadcast.topic must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
