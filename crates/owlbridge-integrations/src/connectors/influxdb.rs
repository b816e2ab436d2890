//! InfluxDB 1.x connector.
//!
//! Points are written with the HTTP `/write` endpoint in line protocol:
//!
//! ```text
//! power1,nodeid=1 value=300i
//! vrms,nodeid=1 value=229.4
//! ```
//!
//! Integer fields carry the `i` suffix so each measurement keeps a single
//! field type across writes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use owlbridge_core::InfluxDbConfig;
use owlbridge_devices::MetricValue;
use owlbridge_dispatch::DataPoint;

use crate::sink::{PointWriter, SinkError, SinkResult};

/// HTTP writer for one InfluxDB database.
pub struct InfluxDbWriter {
    client: Client,
    config: InfluxDbConfig,
}

impl InfluxDbWriter {
    /// Create a writer with the configured request timeout.
    pub fn new(config: InfluxDbConfig) -> SinkResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &InfluxDbConfig {
        &self.config
    }

    /// Run `CREATE DATABASE` once. The statement is a no-op for an existing
    /// database.
    pub async fn create_database(&self) -> SinkResult<()> {
        let url = format!("{}/query", self.config.base_url());
        let statement = format!("CREATE DATABASE \"{}\"", self.config.database);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("q", statement.as_str()),
                ("u", self.config.user.as_str()),
                ("p", self.config.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Create the database, retrying every `retry_delay_secs` until it
    /// succeeds or `max_attempts` is used up (0 retries forever).
    pub async fn ensure_database(&self) -> SinkResult<()> {
        let delay = Duration::from_secs(self.config.retry_delay_secs);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.create_database().await {
                Ok(()) => {
                    info!(
                        category = "influxdb",
                        "Database {} ready at {}",
                        self.config.database,
                        self.config.base_url()
                    );
                    return Ok(());
                }
                Err(e) => {
                    if self.config.max_attempts != 0 && attempt >= self.config.max_attempts {
                        return Err(e);
                    }
                    warn!(
                        category = "influxdb",
                        "Database not reachable (attempt {}): {}. Retrying in {}s",
                        attempt,
                        e,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl PointWriter for InfluxDbWriter {
    async fn write_points(&self, points: &[DataPoint]) -> SinkResult<()> {
        let body = points
            .iter()
            .filter_map(to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");
        if body.is_empty() {
            return Ok(());
        }

        let url = format!("{}/write", self.config.base_url());
        debug!("Writing to {}: {}", url, body);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("db", self.config.database.as_str()),
                ("u", self.config.user.as_str()),
                ("p", self.config.password.as_str()),
            ])
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Write(format!("{}: {}", status, body.trim())));
        }
        Ok(())
    }
}

/// Render one point as a line-protocol line.
///
/// Non-finite float fields are dropped; a point left without fields yields
/// `None`.
pub fn to_line_protocol(point: &DataPoint) -> Option<String> {
    let fields = point
        .fields
        .iter()
        .filter_map(|(key, value)| {
            format_field(value).map(|v| format!("{}={}", escape_key(key), v))
        })
        .collect::<Vec<_>>();
    if fields.is_empty() {
        return None;
    }

    let mut line = escape_measurement(&point.measurement);
    for (key, value) in &point.tags {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }
    line.push(' ');
    line.push_str(&fields.join(","));
    Some(line)
}

fn format_field(value: &MetricValue) -> Option<String> {
    match *value {
        MetricValue::Integer(i) => Some(format!("{}i", i)),
        MetricValue::Float(f) if f.is_finite() => Some(f.to_string()),
        MetricValue::Float(_) => None,
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
