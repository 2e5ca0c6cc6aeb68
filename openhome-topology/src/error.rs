//! Error types for the topology layer

use thiserror::Error;

use openhome_events::EventManagerError;
use openhome_services::{DeviceId, ServiceError};

/// Errors that can occur in topology reconciliation and its API
#[derive(Error, Debug)]
pub enum StateError {
    /// Subscription orchestration failed
    #[error("Event manager error: {0}")]
    Events(#[from] EventManagerError),

    /// Service decode or browse failed
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// The reconciler thread could not be spawned
    #[error("Failed to start reconciler: {0}")]
    ReconcilerStartup(std::io::Error),

    /// No product with this device ID is known
    #[error("Product not found: {0}")]
    ProductNotFound(DeviceId),

    /// No Playlist event has been seen for this device
    #[error("No playlist known for {0}")]
    PlaylistUnknown(DeviceId),
}

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, StateError>;
