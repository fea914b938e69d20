//! Sensor construction from `<sensor>` configuration nodes.

use super::{register_builtin_sensors, Sensor, SensorOwner, SensorRegistry};
use crate::config::ConfigNode;
use crate::error::SimError;

/// Creates a sensor from a `<sensor class="...">` node.
///
/// The node is validated before any registry lookup: the tag must be
/// `sensor` and `class` must be non-empty.
pub fn sensor_factory(
    owner: &SensorOwner<'_>,
    node: &ConfigNode,
) -> Result<Box<dyn Sensor>, SimError> {
    if node.tag() != "sensor" {
        return Err(SimError::malformed(
            "sensor",
            format!("expected <sensor>, found <{}>", node.tag()),
        ));
    }
    
    let class = node.attr("class").map(str::trim).unwrap_or_default();
    if class.is_empty() {
        return Err(SimError::malformed(
            "class",
            "<sensor> requires a non-empty 'class' attribute",
        ));
    }
    
    register_builtin_sensors();
    let mut sensor = SensorRegistry::global().create(class, owner, node)?;
    sensor.parse_visual(node.child("visual"))?;
    
    tracing::debug!(owner = owner.name, class, sensor = sensor.name(), "sensor created");
    Ok(sensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    
    fn owner(count: usize) -> SensorOwner<'static> {
        SensorOwner {
            name: "r1",
            sensor_count: count,
            base_path: Path::new("."),
        }
    }
    
    #[test]
    fn test_wrong_tag_rejected() {
        let node = ConfigNode::new("sensr").with_attr("class", "laser");
        let err = sensor_factory(&owner(0), &node).unwrap_err();
        assert_eq!(err.field(), Some("sensor"));
    }
    
    #[test]
    fn test_missing_or_empty_class_rejected() {
        for node in [
            ConfigNode::new("sensor"),
            ConfigNode::new("sensor").with_attr("class", "  "),
        ] {
            let err = sensor_factory(&owner(0), &node).unwrap_err();
            assert_eq!(err.field(), Some("class"));
        }
    }
    
    #[test]
    fn test_unknown_class() {
        let node = ConfigNode::new("sensor").with_attr("class", "sonar");
        let err = sensor_factory(&owner(0), &node).unwrap_err();
        assert!(matches!(err, SimError::UnknownSensorType(_)));
    }
    
    #[test]
    fn test_auto_naming_by_ordinal() {
        let laser = sensor_factory(&owner(0), &ConfigNode::new("sensor").with_attr("class", "laser")).unwrap();
        let camera = sensor_factory(&owner(1), &ConfigNode::new("sensor").with_attr("class", "camera")).unwrap();
        assert_eq!(laser.name(), "laser1");
        assert_eq!(camera.name(), "camera2");
    }
    
    #[test]
    fn test_rgbd_camera_from_config() {
        let node = ConfigNode::new("sensor")
            .with_attr("class", "rgbd_camera")
            .with_param("ncols", "16")
            .with_param("range_max", "12");
        let sensor = sensor_factory(&owner(2), &node).unwrap();
        assert_eq!(sensor.class_name(), "rgbd_camera");
        assert_eq!(sensor.name(), "rgbd_camera3");
        
        let bad = ConfigNode::new("sensor")
            .with_attr("class", "rgbd_camera")
            .with_param("fov_degrees", "200");
        let err = sensor_factory(&owner(0), &bad).unwrap_err();
        assert_eq!(err.field(), Some("fov_degrees"));
    }
    
    #[test]
    fn test_bad_visual_propagates() {
        let node = ConfigNode::new("sensor")
            .with_attr("class", "laser")
            .with_child(ConfigNode::new("visual").with_attr("show_fov", "perhaps"));
        let err = sensor_factory(&owner(0), &node).unwrap_err();
        assert_eq!(err.field(), Some("show_fov"));
    }
}
