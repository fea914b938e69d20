//! Wire types shared by the transport and the rawlog codec.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// Envelope carrying one serialized observation.
///
/// This is the unit published on a sensor topic and the record type
/// appended to rawlog files. The observation itself is opaque bytes
/// produced by the sensor-side codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEnvelope {
    /// Observation timestamp as floating-point Unix seconds
    pub unix_timestamp: f64,
    
    /// Name of the entity the producing sensor is mounted on
    pub source_object_id: String,
    
    /// Raw serialized observation bytes
    pub serialized_observation: Vec<u8>,
}

impl ObservationEnvelope {
    /// Creates a new envelope.
    pub fn new(
        unix_timestamp: f64,
        source_object_id: impl Into<String>,
        serialized_observation: Vec<u8>,
    ) -> Self {
        Self {
            unix_timestamp,
            source_object_id: source_object_id.into(),
            serialized_observation,
        }
    }
    
    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.serialized_observation.len()
    }
    
    /// Encodes the envelope with the workspace wire codec.
    pub fn encode(&self) -> Result<Vec<u8>, EnvError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(EnvError::serialization)
    }
    
    /// Decodes an envelope previously produced by [`ObservationEnvelope::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvError> {
        let (envelope, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(EnvError::serialization)?;
        Ok(envelope)
    }
}
