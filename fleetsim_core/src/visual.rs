//! World-owned registry of sensor visualizations.

use crate::physics::Pose;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// How a sensor is drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VisualKind {
    /// A marker at the mounting point
    Origin,
    
    /// A field-of-view wedge
    Fov { aperture: f64, range: f64 },
}

/// One drawable sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorVisual {
    pub owner: String,
    pub sensor: String,
    /// Mounting pose relative to the owner: [x, y, yaw]
    pub mount: [f64; 3],
    pub kind: VisualKind,
}

impl SensorVisual {
    pub fn new(owner: &str, sensor: &str, mount: &Pose, kind: VisualKind) -> Self {
        Self {
            owner: owner.to_string(),
            sensor: sensor.to_string(),
            mount: [
                mount.translation.vector.x,
                mount.translation.vector.y,
                mount.rotation.angle(),
            ],
            kind,
        }
    }
}

/// Shared list of visuals, read by the GUI thread.
#[derive(Debug, Default)]
pub struct VisualRegistry {
    visuals: Mutex<Vec<SensorVisual>>,
}

impl VisualRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn register(&self, visual: SensorVisual) {
        self.visuals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(visual);
    }
    
    /// Copies the current visuals.
    pub fn snapshot(&self) -> Vec<SensorVisual> {
        self.visuals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    
    /// Drops every visual of one owner.
    pub fn remove_owner(&self, owner: &str) {
        self.visuals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|v| v.owner != owner);
    }
    
    pub fn clear(&self) {
        self.visuals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
    
    pub fn len(&self) -> usize {
        self.visuals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_remove_owner() {
        let reg = VisualRegistry::new();
        reg.register(SensorVisual::new("r1", "laser1", &Pose::identity(), VisualKind::Origin));
        reg.register(SensorVisual::new("r2", "laser1", &Pose::identity(), VisualKind::Origin));
        
        reg.remove_owner("r1");
        
        let left = reg.snapshot();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].owner, "r2");
    }
}
