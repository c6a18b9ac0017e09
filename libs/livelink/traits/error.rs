use thiserror::Error;

/// Main error type for livelink
#[derive(Error, Debug)]
pub enum LiveLinkError {
    /// The configured endpoint cannot be used for a WebSocket handshake
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The task owning the connection state has stopped
    #[error("Connection manager stopped")]
    ManagerStopped,

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Result type for livelink operations
pub type Result<T> = std::result::Result<T, LiveLinkError>;
