//! Provisioning cache.
//!
//! Tracks, for every `(gateway, device, measurement)` seen since start-up,
//! whether its discovery document went out and the last value recorded.
//! Entries are never removed while the process runs.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;

use owlbridge_devices::{Measurement, MetricValue};

/// Cache key for a single sensor entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub gateway: String,
    pub device: u16,
    pub measurement: String,
}

impl CacheKey {
    pub fn new(gateway: impl Into<String>, device: u16, measurement: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            device,
            measurement: measurement.into(),
        }
    }
}

impl From<&Measurement> for CacheKey {
    fn from(m: &Measurement) -> Self {
        Self::new(&m.gateway, m.device, &m.name)
    }
}

/// Provisioning state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProvisioningEntry {
    pub announced: bool,
    pub last_value: MetricValue,
}

/// Process-lifetime provisioning state.
///
/// Every call takes the lock once and releases it before returning, so
/// callers never hold it across sink I/O.
#[derive(Debug, Default)]
pub struct ProvisioningCache {
    entries: Mutex<BTreeMap<CacheKey, ProvisioningEntry>>,
}

impl ProvisioningCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn is_announced(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .get(key)
            .map(|entry| entry.announced)
            .unwrap_or(false)
    }

    /// Upsert the last value of a key without touching `announced`.
    pub fn record_seen(&self, key: &CacheKey, value: MetricValue) {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => entry.last_value = value,
            None => {
                entries.insert(
                    key.clone(),
                    ProvisioningEntry {
                        announced: false,
                        last_value: value,
                    },
                );
            }
        }
    }

    /// Flip `announced` to true.
    ///
    /// Returns `true` only on the transition. Unknown keys are left absent.
    pub fn mark_announced(&self, key: &CacheKey) -> bool {
        match self.entries.lock().get_mut(key) {
            Some(entry) if !entry.announced => {
                entry.announced = true;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<ProvisioningEntry> {
        self.entries.lock().get(key).copied()
    }

    /// All keys with their last values, ordered by key.
    pub fn snapshot(&self) -> Vec<(CacheKey, MetricValue)> {
        self.entries
            .lock()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.last_value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
