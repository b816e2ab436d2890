//! Configuration source detection and full-file loading.

use std::io::Write;
use std::path::{Path, PathBuf};

use owlbridge_core::config::env_vars;
use owlbridge_core::{BridgeConfig, ConfigSource};

const FULL_CONFIG: &str = r#"
[main]
log_level = "debug"
api_host = "0.0.0.0"
api_port = 5001

[mqtt]
address = "mqtt.home"
port = 1884
user = "bridge"
password = "secret"
topic = "Gw/+/+/+"
regex = "Gw/([^/]+)/([^/]+)/([^/]+)"
client_id = "bridge-test"
keep_alive = 30
reconnect_delay_secs = 1

[influxdb]
enabled = true
address = "influx.home"
port = 8087
user = "writer"
password = "pw"
database = "sensors"
retry_delay_secs = 2
max_attempts = 3
timeout_secs = 4

[rebroadcast]
enabled = true
sensor_list = [1, 12]
topic = "Simple"

[ha_integration]
enabled = true
base_topic = "owl"
ha_status_topic = "hass/status"
discovery_prefix = "hass"
manufacturer = "Acme"
model = "Node"
"#;

#[test]
fn test_full_file_overrides_every_section() {
    let config: BridgeConfig = toml::from_str(FULL_CONFIG).unwrap();
    config.validate().unwrap();

    assert_eq!(config.main.api_host, "0.0.0.0");
    assert_eq!(config.mqtt.broker_addr(), "mqtt.home:1884");
    assert_eq!(config.mqtt.user.as_deref(), Some("bridge"));
    assert_eq!(config.influxdb.base_url(), "http://influx.home:8087");
    assert_eq!(config.influxdb.max_attempts, 3);
    assert_eq!(config.rebroadcast.sensor_list, vec![1, 12]);
    assert_eq!(config.ha_integration.availability_topic(), "owl/status");
    assert_eq!(config.ha_integration.discovery_prefix, "hass");
}

#[test]
fn test_environment_path_is_used() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();

    // the only test in this binary touching the variable
    std::env::set_var(env_vars::CONFIG_PATH, file.path());
    let source = ConfigSource::detect(None);
    let explicit = ConfigSource::detect(Some(Path::new("/etc/explicit.toml")));
    let config = BridgeConfig::load(&source);
    std::env::remove_var(env_vars::CONFIG_PATH);

    assert_eq!(source, ConfigSource::File(file.path().to_path_buf()));
    assert_eq!(explicit, ConfigSource::File(PathBuf::from("/etc/explicit.toml")));
    assert_eq!(config.unwrap().mqtt.client_id, "bridge-test");
}

#[test]
fn test_builtin_defaults_load() {
    let config = BridgeConfig::load(&ConfigSource::Defaults).unwrap();
    assert_eq!(config, BridgeConfig::default());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = ConfigSource::File(dir.path().join("missing.toml"));
    assert!(BridgeConfig::load(&source).is_err());
}
