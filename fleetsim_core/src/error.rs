//! Error types for the FleetSim core.

use fleetsim_env::EnvError;
use thiserror::Error;

/// Errors raised while loading or running a simulated world.
///
/// Configuration errors (`MalformedConfig`, `UnknownSensorType`, `Xml`) are
/// returned synchronously from load operations. Sink errors
/// (`LogWriteFailure`, `Transport`) only occur inside dispatch jobs, where
/// they are logged and counted instead of propagated.
#[derive(Debug, Error)]
pub enum SimError {
    /// Missing or invalid attribute/child, or wrong element tag
    #[error("Malformed config at '{field}': {reason}")]
    MalformedConfig {
        /// Offending attribute, child or element name
        field: String,
        /// Human-readable description
        reason: String,
    },
    
    /// `class` names a sensor type nobody registered
    #[error("Unknown sensor type '{0}'")]
    UnknownSensorType(String),
    
    /// The XML text could not be parsed at all
    #[error("XML parse error: {0}")]
    Xml(String),
    
    /// Appending to (or opening) a rawlog failed
    #[error("Log write failure: {0}")]
    LogWriteFailure(String),
    
    /// Observation (de)serialization failed
    #[error("Codec error: {0}")]
    Codec(String),
    
    /// Pub/sub transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] EnvError),
    
    /// GUI backend failure
    #[error("GUI error: {0}")]
    Gui(String),
    
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Creates a `MalformedConfig` error for the given field.
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
    
    /// Returns the offending field name for configuration errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MalformedConfig { field, .. } => Some(field),
            _ => None,
        }
    }
}
