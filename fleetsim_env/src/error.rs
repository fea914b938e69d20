//! Error types for the FleetSim transport abstraction.

use thiserror::Error;

/// Errors that can occur in the transport abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Publish failed (subscriber gone, transport closed, etc.)
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    
    /// Publish attempted on a topic that was never advertised
    #[error("Topic not advertised: {0}")]
    TopicNotAdvertised(String),
    
    /// Envelope serialization/deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
    
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvError {
    /// Creates a transport failure.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportFailure(msg.into())
    }
    
    /// Creates a serialization error from any displayable codec error.
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        Self::SerializationError(err.to_string())
    }
}
