//! Liveness flags shared between the message loop and the status endpoint.
//!
//! The status endpoint only reads atomics, so it never waits on message
//! processing and message processing never waits on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct HealthInner {
    loop_alive: AtomicBool,
    connected: AtomicBool,
    started_at: i64,
}

/// Cloneable handle to the bridge health flags.
#[derive(Debug, Clone)]
pub struct HealthState {
    inner: Arc<HealthInner>,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HealthInner {
                loop_alive: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                started_at: chrono::Utc::now().timestamp(),
            }),
        }
    }

    /// Mark the message loop as running or stopped.
    pub fn set_loop_alive(&self, alive: bool) {
        self.inner.loop_alive.store(alive, Ordering::SeqCst);
    }

    /// Record the broker connection state.
    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_loop_alive(&self) -> bool {
        self.inner.loop_alive.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Healthy while the message loop runs and the broker is connected.
    pub fn is_healthy(&self) -> bool {
        self.is_loop_alive() && self.is_connected()
    }

    /// Seconds since the handle was created.
    pub fn uptime_secs(&self) -> u64 {
        (chrono::Utc::now().timestamp() - self.inner.started_at).max(0) as u64
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}
