//! Error types for the event manager

use thiserror::Error;

use openhome_services::{DeviceId, Service};

use crate::engine::EngineError;

/// Errors that can occur while orchestrating subscriptions
#[derive(Error, Debug)]
pub enum EventManagerError {
    /// The engine refused or failed an operation
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The background worker is gone (shutdown or panic)
    #[error("Event worker disconnected")]
    WorkerDisconnected,

    /// A release was issued for a subscription nobody holds
    #[error("No subscription held for {device} service {service}")]
    NotSubscribed { device: DeviceId, service: Service },

    /// The worker thread could not be started
    #[error("Failed to start event worker: {0}")]
    WorkerStartup(String),
}

/// Result type for event manager operations
pub type Result<T> = std::result::Result<T, EventManagerError>;
