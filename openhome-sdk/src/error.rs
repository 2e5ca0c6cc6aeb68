use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Topology error: {0}")]
    State(#[from] openhome_topology::StateError),

    #[error("Event manager error: {0}")]
    Events(#[from] openhome_events::EventManagerError),

    #[error("Service error: {0}")]
    Service(#[from] openhome_services::ServiceError),

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("House cache error: {0}")]
    Cache(String),
}
