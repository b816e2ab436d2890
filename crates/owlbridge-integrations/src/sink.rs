//! Sink traits and the action executor.
//!
//! The dispatcher produces [`OutboundAction`]s; the executor hands them to the
//! broker publisher or the point writer. A failing sink is logged and skipped,
//! it never stops the remaining actions or the next message. Only a discovery
//! message the publisher accepted marks its entity announced, so a failed one
//! is dispatched again with the entity's next value.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};

use owlbridge_dispatch::{DataPoint, OutboundAction, ProvisioningCache};

/// Sink error type.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The transport has no live session.
    #[error("Not connected")]
    NotConnected,

    /// Broker rejected or dropped a publish.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Database rejected a write.
    #[error("Write failed: {0}")]
    Write(String),

    /// Database answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Request never reached the database.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Broker side of the bridge.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> SinkResult<()>;
}

/// Time-series side of the bridge.
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write_points(&self, points: &[DataPoint]) -> SinkResult<()>;
}

/// Outcome of executing one batch of actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub published: usize,
    pub written: usize,
    pub failed: usize,
}

impl ExecutionReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Runs dispatcher actions against the configured sinks.
#[derive(Clone)]
pub struct ActionExecutor {
    publisher: Arc<dyn MessagePublisher>,
    writer: Option<Arc<dyn PointWriter>>,
    cache: Option<Arc<ProvisioningCache>>,
}

impl ActionExecutor {
    pub fn new(publisher: Arc<dyn MessagePublisher>, writer: Option<Arc<dyn PointWriter>>) -> Self {
        Self {
            publisher,
            writer,
            cache: None,
        }
    }

    /// Record delivered discovery messages in `cache`.
    pub fn with_cache(mut self, cache: Arc<ProvisioningCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Execute a batch. Database points go out in one write, broker messages
    /// in dispatch order.
    pub async fn execute(&self, actions: Vec<OutboundAction>) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        let mut points = Vec::new();
        let mut publishes = Vec::new();

        for action in actions {
            match action {
                OutboundAction::DatabaseWrite(point) => points.push(point),
                other => publishes.push(other),
            }
        }

        if !points.is_empty() {
            match &self.writer {
                Some(writer) => match writer.write_points(&points).await {
                    Ok(()) => {
                        debug!("Wrote {} points", points.len());
                        report.written += points.len();
                    }
                    Err(e) => {
                        error!(sink = "database", "Failed to write {} points: {}", points.len(), e);
                        report.failed += points.len();
                    }
                },
                None => {
                    error!(sink = "database", "No database writer configured, dropping {} points", points.len());
                    report.failed += points.len();
                }
            }
        }

        for action in publishes {
            let Some(message) = action.publish() else {
                continue;
            };
            match self
                .publisher
                .publish(&message.topic, &message.payload, message.retain)
                .await
            {
                Ok(()) => {
                    report.published += 1;
                    if let (OutboundAction::Discovery { key, .. }, Some(cache)) =
                        (&action, &self.cache)
                    {
                        cache.mark_announced(key);
                    }
                }
                Err(e) => {
                    error!(sink = %action.kind(), "Failed to publish to {}: {}", message.topic, e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
