//! Owlbridge dispatch crate.
//!
//! Fans decoded measurements out to the enabled sinks and keeps track of which
//! Home Assistant entities have already been announced.

pub mod action;
pub mod cache;
pub mod discovery;
pub mod dispatcher;

pub use action::{ActionKind, DataPoint, OutboundAction, Publish};
pub use cache::{CacheKey, ProvisioningCache, ProvisioningEntry};
pub use discovery::{Component, DiscoveryDocument, DiscoverySettings, SensorProfile};
pub use dispatcher::{DispatchSettings, Dispatcher, RebroadcastSettings};
