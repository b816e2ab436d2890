//! Transport connectors.

pub mod influxdb;
pub mod mqtt;
