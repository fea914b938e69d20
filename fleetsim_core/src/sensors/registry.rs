//! Process-wide sensor class table.

use super::{CameraSensor, DepthCameraSensor, LaserScanner, Sensor, SensorOwner};
use crate::config::ConfigNode;
use crate::error::SimError;
use std::collections::HashMap;
use std::sync::{Once, OnceLock, PoisonError, RwLock};

/// Builds a configured sensor from its configuration node.
pub type SensorConstructor =
    fn(&SensorOwner<'_>, &ConfigNode) -> Result<Box<dyn Sensor>, SimError>;

static REGISTRY: OnceLock<SensorRegistry> = OnceLock::new();
static BUILTINS: Once = Once::new();

/// Maps `class` tags to constructors.
#[derive(Default)]
pub struct SensorRegistry {
    constructors: RwLock<HashMap<String, SensorConstructor>>,
}

impl SensorRegistry {
    /// The process-wide registry.
    pub fn global() -> &'static SensorRegistry {
        REGISTRY.get_or_init(SensorRegistry::default)
    }
    
    /// Registers `tag`. A second registration of the same tag is ignored
    /// and returns `false`.
    pub fn register(&self, tag: &str, constructor: SensorConstructor) -> bool {
        let mut table = self
            .constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(tag) {
            return false;
        }
        table.insert(tag.to_string(), constructor);
        tracing::debug!(tag, "sensor class registered");
        true
    }
    
    /// Instantiates the sensor registered under `tag`.
    pub fn create(
        &self,
        tag: &str,
        owner: &SensorOwner<'_>,
        node: &ConfigNode,
    ) -> Result<Box<dyn Sensor>, SimError> {
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .copied()
            .ok_or_else(|| SimError::UnknownSensorType(tag.to_string()))?;
        constructor(owner, node)
    }
    
    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(tag)
    }
    
    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        tags.sort();
        tags
    }
}

/// Registers the built-in sensor types once per process.
pub fn register_builtin_sensors() {
    BUILTINS.call_once(|| {
        let registry = SensorRegistry::global();
        registry.register("laser", LaserScanner::create);
        registry.register("rgbd_camera", DepthCameraSensor::create);
        registry.register("camera", CameraSensor::create);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    
    fn owner() -> SensorOwner<'static> {
        SensorOwner {
            name: "r1",
            sensor_count: 0,
            base_path: Path::new("."),
        }
    }
    
    #[test]
    fn test_builtins_registered_once() {
        register_builtin_sensors();
        register_builtin_sensors();
        let registry = SensorRegistry::global();
        assert!(registry.is_registered("laser"));
        assert!(registry.is_registered("camera"));
        assert!(registry.is_registered("rgbd_camera"));
        assert!(!registry.register("laser", LaserScanner::create));
    }
    
    #[test]
    fn test_unknown_tag() {
        let registry = SensorRegistry::default();
        let err = registry
            .create("sonar", &owner(), &ConfigNode::new("sensor"))
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownSensorType(tag) if tag == "sonar"));
    }
    
    #[test]
    fn test_local_registry_creates() {
        let registry = SensorRegistry::default();
        assert!(registry.register("cam", CameraSensor::create));
        let sensor = registry
            .create("cam", &owner(), &ConfigNode::new("sensor"))
            .unwrap();
        assert_eq!(sensor.class_name(), "camera");
        assert_eq!(sensor.name(), "camera1");
        assert_eq!(registry.tags(), vec!["cam".to_string()]);
    }
}
