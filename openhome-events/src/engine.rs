//! The engine seam
//!
//! Everything the wire protocol does is reached through
//! [`ControlPointEngine`]; everything it produces comes back through an
//! [`EventSink`]. The native ohNet-style engine binding implements the trait
//! on one side, and tests substitute [`crate::MockEngine`] on the other.

use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use openhome_services::{DeviceId, PropertySet, Service};

/// Opaque handle for one live GENA subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One NOTIFY from one subscribed service
#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub device: DeviceId,
    pub service: Service,
    pub properties: PropertySet,
    pub received_at: Instant,
}

impl ServiceEvent {
    pub fn new(device: DeviceId, service: Service, properties: PropertySet) -> Self {
        Self {
            device,
            service,
            properties,
            received_at: Instant::now(),
        }
    }

    /// GENA sequence number; 0 marks the initial full-state NOTIFY
    pub fn seq(&self) -> u32 {
        self.properties.seq
    }
}

/// What the engine reports upward
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Discovery found a device offering OpenHome services
    DeviceAdded(DeviceId),
    /// The device left the network or stopped answering
    DeviceRemoved(DeviceId),
    /// A subscribed service evented
    Notify(ServiceEvent),
}

/// Cloneable handle the engine uses to deliver events
///
/// Delivery never blocks; if the consumer side is gone the event is dropped,
/// which only happens during shutdown.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }

    pub fn device_added(&self, device: DeviceId) {
        let _ = self.tx.send(EngineEvent::DeviceAdded(device));
    }

    pub fn device_removed(&self, device: DeviceId) {
        let _ = self.tx.send(EngineEvent::DeviceRemoved(device));
    }

    pub fn notify(&self, event: ServiceEvent) {
        let _ = self.tx.send(EngineEvent::Notify(event));
    }
}

/// Errors surfaced by the engine binding
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Device {0} is not known to the engine")]
    DeviceUnknown(DeviceId),

    #[error("Device {device} does not offer service {service}")]
    ServiceUnavailable { device: DeviceId, service: Service },

    #[error("Subscription {0} is not active")]
    SubscriptionUnknown(SubscriptionId),

    #[error("Engine transport failure: {0}")]
    Transport(String),
}

/// The opaque UPnP control-point engine
///
/// Implementations own discovery, GENA transport and renewal. `attach` is
/// called exactly once, before any subscription, and hands over the sink the
/// engine reports through for the rest of its life.
#[async_trait]
pub trait ControlPointEngine: Send + Sync + 'static {
    /// Hand the engine its reporting channel and start discovery
    async fn attach(&self, sink: EventSink) -> Result<(), EngineError>;

    /// Open a GENA subscription; the initial NOTIFY follows on the sink
    async fn subscribe(
        &self,
        device: &DeviceId,
        service: Service,
    ) -> Result<SubscriptionId, EngineError>;

    /// Close a subscription previously returned by `subscribe`
    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), EngineError>;
}
