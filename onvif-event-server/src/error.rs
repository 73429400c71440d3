//! Error types for the event server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind event service: {0}")]
    Bind(#[from] warp::Error),

    /// The event subsystem rejected the configuration or failed to start
    #[error(transparent)]
    Events(#[from] onvif_events::EventError),
}

pub type Result<T> = std::result::Result<T, ServerError>;
