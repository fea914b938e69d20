//! Sensor observations.
//!
//! An [`Observation`] is produced once per trigger on the simulation thread
//! and then shared (`Arc`) with the dispatch job that fans it out.

use crate::error::SimError;
use crate::physics::Pose;
use fleetsim_env::ObservationEnvelope;
use serde::{Deserialize, Serialize};

/// Shared, immutable observation handle.
pub type ObservationPtr = std::sync::Arc<Observation>;

/// A timestamped sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Name of the producing sensor
    pub sensor_label: String,
    
    /// Capture time as Unix seconds (world epoch + simulation time)
    pub timestamp: f64,
    
    /// Sensor pose in the world frame at capture: [x, y, yaw]
    pub sensor_pose: [f64; 3],
    
    /// Sensor-specific data
    pub payload: ObservationPayload,
}

/// Sensor-specific observation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObservationPayload {
    /// Planar range scan
    RangeScan(RangeScan),
    
    /// Grayscale image
    Image(GrayImage),
    
    /// Grayscale image with one depth sample per column
    Depth(DepthImage),
}

/// Planar range scan, rays ordered from right to left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeScan {
    /// Angular field of view (radians)
    pub aperture: f64,
    
    /// Maximum range (meters); misses report this value
    pub max_range: f64,
    
    /// Measured range per ray (meters)
    pub ranges: Vec<f32>,
    
    /// Whether each ray hit something
    pub valid: Vec<bool>,
}

/// Image plus per-column range, columns ordered left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthImage {
    pub image: GrayImage,
    
    /// Maximum range (meters); misses report this value
    pub max_range: f64,
    
    /// Range per image column (meters)
    pub depth: Vec<f32>,
    
    /// Whether each column ray hit something
    pub valid: Vec<bool>,
}

/// Row-major 8-bit grayscale image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrayImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl GrayImage {
    /// Creates a black image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }
    
    /// Returns the pixel at (col, row).
    pub fn get(&self, col: u32, row: u32) -> Option<u8> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.pixels.get((row * self.width + col) as usize).copied()
    }
}

impl Observation {
    /// Creates an observation captured at `pose`.
    pub fn new(
        sensor_label: impl Into<String>,
        timestamp: f64,
        pose: &Pose,
        payload: ObservationPayload,
    ) -> Self {
        Self {
            sensor_label: sensor_label.into(),
            timestamp,
            sensor_pose: [
                pose.translation.vector.x,
                pose.translation.vector.y,
                pose.rotation.angle(),
            ],
            payload,
        }
    }
    
    /// Serializes the observation into opaque bytes.
    pub fn encode(&self) -> Result<Vec<u8>, SimError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| SimError::Codec(e.to_string()))
    }
    
    /// Deserializes bytes produced by [`Observation::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, SimError> {
        let (obs, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| SimError::Codec(e.to_string()))?;
        Ok(obs)
    }
    
    /// Wraps the serialized observation in a transport envelope.
    pub fn to_envelope(&self, source_object_id: &str) -> Result<ObservationEnvelope, SimError> {
        Ok(ObservationEnvelope::new(
            self.timestamp,
            source_object_id,
            self.encode()?,
        ))
    }
    
    /// Decodes the observation carried by an envelope.
    pub fn from_envelope(envelope: &ObservationEnvelope) -> Result<Self, SimError> {
        Self::decode(&envelope.serialized_observation)
    }
}
