//! Simulated entities: vehicles (sensor owners), blocks and world elements.

use crate::config::ConfigNode;
use crate::context::SimulationContext;
use crate::dispatch::DispatchPool;
use crate::error::SimError;
use crate::params::{ParamReader, VarMap};
use crate::physics::{BodyId, Pose, Twist};
use crate::scene::{Obstacle, Scene};
use crate::sensors::{sensor_factory, Sensor, SensorContext, SensorOwner};
use crate::visual::VisualRegistry;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// A mobile entity carrying sensors.
#[derive(Debug)]
pub struct Vehicle {
    name: String,
    body: Option<BodyId>,
    pose: Pose,
    twist: Twist,
    sensors: Vec<Box<dyn Sensor>>,
}

impl Vehicle {
    pub fn new(name: impl Into<String>, pose: Pose, twist: Twist) -> Self {
        Self {
            name: name.into(),
            body: None,
            pose,
            twist,
            sensors: Vec::new(),
        }
    }
    
    /// Builds a vehicle and its sensors from a `<vehicle>` node.
    pub fn from_config(node: &ConfigNode, base_path: &Path) -> Result<Self, SimError> {
        let name = node.attr("name").map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(SimError::malformed("name", "<vehicle> requires a non-empty 'name'"));
        }
        
        let vars = VarMap::from([("NAME".to_string(), name.to_string())]);
        let reader = ParamReader::new(node, &vars);
        let pose = reader.opt_pose("init_pose")?.unwrap_or_else(Pose::identity);
        let twist = reader.opt_twist("init_vel")?.unwrap_or_default();
        
        let mut vehicle = Self::new(name, pose, twist);
        for sensor_node in node.children_named("sensor") {
            vehicle.attach_sensor_from_config(sensor_node, base_path)?;
        }
        
        tracing::debug!(vehicle = name, sensors = vehicle.sensors.len(), "vehicle loaded");
        Ok(vehicle)
    }
    
    /// Creates a sensor through the factory and attaches it.
    ///
    /// Nothing is attached when creation fails.
    pub fn attach_sensor_from_config(
        &mut self,
        node: &ConfigNode,
        base_path: &Path,
    ) -> Result<(), SimError> {
        let owner = SensorOwner {
            name: &self.name,
            sensor_count: self.sensors.len(),
            base_path,
        };
        let sensor = sensor_factory(&owner, node)?;
        self.add_sensor(sensor)
    }
    
    /// Attaches a sensor. Its name must be unique on this vehicle.
    pub fn add_sensor(&mut self, sensor: Box<dyn Sensor>) -> Result<(), SimError> {
        if sensor.name().is_empty() {
            return Err(SimError::malformed("name", "sensor name is empty"));
        }
        if self.sensors.iter().any(|s| s.name() == sensor.name()) {
            return Err(SimError::malformed(
                "name",
                format!("duplicate sensor name '{}' on vehicle '{}'", sensor.name(), self.name),
            ));
        }
        self.sensors.push(sensor);
        Ok(())
    }
    
    /// Verifies that every sensor name is non-empty and unique.
    pub fn check_unique_sensor_names(&self) -> Result<(), SimError> {
        let mut seen = HashSet::new();
        for sensor in &self.sensors {
            if sensor.name().is_empty() || !seen.insert(sensor.name()) {
                return Err(SimError::malformed(
                    "name",
                    format!("sensor name '{}' on vehicle '{}' is empty or repeated", sensor.name(), self.name),
                ));
            }
        }
        Ok(())
    }
    
    /// Runs every sensor's post-timestep hook. Returns the number of jobs
    /// submitted.
    pub fn simulate_sensors(
        &mut self,
        sim: &SimulationContext,
        scene: &Scene,
        dispatch: &DispatchPool,
    ) -> usize {
        let ctx = SensorContext {
            sim,
            owner_pose: self.pose,
            scene,
            dispatch,
        };
        let mut fired = 0;
        for sensor in &mut self.sensors {
            if sensor.simul_post_timestep(&ctx) {
                fired += 1;
            }
        }
        fired
    }
    
    pub fn register_visuals(&self, registry: &VisualRegistry) {
        for sensor in &self.sensors {
            sensor.register_visual(registry);
        }
    }
    
    pub fn name(&self) -> &str {
        &self.name
    }
    
    pub fn pose(&self) -> &Pose {
        &self.pose
    }
    
    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
    
    pub fn twist(&self) -> &Twist {
        &self.twist
    }
    
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }
    
    pub fn set_body(&mut self, body: Option<BodyId>) {
        self.body = body;
    }
    
    pub fn sensors(&self) -> &[Box<dyn Sensor>] {
        &self.sensors
    }
    
    pub fn sensors_mut(&mut self) -> &mut [Box<dyn Sensor>] {
        &mut self.sensors
    }
    
    pub fn sensor(&self, name: &str) -> Option<&dyn Sensor> {
        self.sensors
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }
}

/// A static circular obstacle.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    pose: Pose,
    radius: f64,
    body: Option<BodyId>,
}

impl Block {
    pub fn new(name: impl Into<String>, pose: Pose, radius: f64) -> Self {
        Self {
            name: name.into(),
            pose,
            radius,
            body: None,
        }
    }
    
    /// Builds a block from a `<block>` node.
    pub fn from_config(node: &ConfigNode) -> Result<Self, SimError> {
        let name = node.attr("name").map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(SimError::malformed("name", "<block> requires a non-empty 'name'"));
        }
        
        let vars = VarMap::from([("NAME".to_string(), name.to_string())]);
        let reader = ParamReader::new(node, &vars);
        let pose = reader.opt_pose("init_pose")?.unwrap_or_else(Pose::identity);
        let radius = reader.opt_f64("radius")?.unwrap_or(0.5);
        if radius <= 0.0 {
            return Err(SimError::malformed("radius", format!("must be > 0, got {radius}")));
        }
        Ok(Self::new(name, pose, radius))
    }
    
    pub fn name(&self) -> &str {
        &self.name
    }
    
    pub fn pose(&self) -> &Pose {
        &self.pose
    }
    
    pub fn radius(&self) -> f64 {
        self.radius
    }
    
    pub fn body(&self) -> Option<BodyId> {
        self.body
    }
    
    pub fn set_body(&mut self, body: Option<BodyId>) {
        self.body = body;
    }
    
    pub fn obstacle(&self) -> Obstacle {
        Obstacle {
            name: self.name.clone(),
            center: [self.pose.translation.vector.x, self.pose.translation.vector.y],
            radius: self.radius,
        }
    }
}

/// A passive world element (ground, walls, decorations) kept as properties.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldElement {
    class: String,
    properties: BTreeMap<String, String>,
}

impl WorldElement {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            properties: BTreeMap::new(),
        }
    }
    
    /// Builds an element from an `<element class="...">` node.
    pub fn from_config(node: &ConfigNode) -> Result<Self, SimError> {
        let class = node.attr("class").map(str::trim).unwrap_or_default();
        if class.is_empty() {
            return Err(SimError::malformed("class", "<element> requires a non-empty 'class'"));
        }
        let mut element = Self::new(class);
        for (key, value) in node.attributes() {
            if key != "class" {
                element.properties.insert(key.clone(), value.clone());
            }
        }
        for child in node.children() {
            element.properties.insert(child.tag().to_string(), child.text().to_string());
        }
        Ok(element)
    }
    
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
    
    pub fn class(&self) -> &str {
        &self.class
    }
    
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
    
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// Name-keyed multimap: several entities may share a name.
#[derive(Debug)]
pub struct NamedRegistry<T> {
    entries: BTreeMap<String, Vec<T>>,
}

impl<T> Default for NamedRegistry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> NamedRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn insert(&mut self, name: impl Into<String>, value: T) {
        self.entries.entry(name.into()).or_default().push(value);
    }
    
    /// Removes every entry under `name`.
    pub fn remove(&mut self, name: &str) -> Vec<T> {
        self.entries.remove(name).unwrap_or_default()
    }
    
    pub fn get(&self, name: &str) -> &[T] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
    
    /// First entry under `name`.
    pub fn first(&self, name: &str) -> Option<&T> {
        self.get(name).first()
    }
    
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
    
    /// Entries in name order, insertion order within a name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v)))
    }
    
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.values_mut().flat_map(|vs| vs.iter_mut())
    }
    
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values().flat_map(|vs| vs.iter())
    }
    
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
    
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    
    pub fn clear(&mut self) {
        self.entries.clear();
    }
    
    /// Removes and returns every entry.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
            .into_values()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{LaserScanner, SensorOwner};
    
    fn sensor(class: &str, name: Option<&str>) -> ConfigNode {
        let mut node = ConfigNode::new("sensor").with_attr("class", class);
        if let Some(name) = name {
            node = node.with_attr("name", name);
        }
        node
    }
    
    #[test]
    fn test_vehicle_from_config() {
        let node = ConfigNode::new("vehicle")
            .with_attr("name", "r1")
            .with_param("init_pose", "1 2 90")
            .with_param("init_vel", "0.5 0 0")
            .with_child(sensor("laser", None))
            .with_child(sensor("camera", None));
        
        let v = Vehicle::from_config(&node, Path::new(".")).unwrap();
        
        assert_eq!(v.name(), "r1");
        assert_eq!(v.pose().translation.vector.x, 1.0);
        assert_eq!(v.twist().vx, 0.5);
        let names: Vec<&str> = v.sensors().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["laser1", "camera2"]);
    }
    
    #[test]
    fn test_vehicle_requires_name() {
        let err = Vehicle::from_config(&ConfigNode::new("vehicle"), Path::new(".")).unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }
    
    #[test]
    fn test_duplicate_sensor_names_rejected() {
        let node = ConfigNode::new("vehicle")
            .with_attr("name", "r1")
            .with_child(sensor("laser", Some("front")))
            .with_child(sensor("camera", Some("front")));
        
        let err = Vehicle::from_config(&node, Path::new(".")).unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }
    
    #[test]
    fn test_unknown_class_attaches_nothing() {
        let mut v = Vehicle::new("r1", Pose::identity(), Twist::default());
        let err = v
            .attach_sensor_from_config(&sensor("sonar", None), Path::new("."))
            .unwrap_err();
        
        assert!(matches!(err, SimError::UnknownSensorType(_)));
        assert!(v.sensors().is_empty());
    }
    
    #[test]
    fn test_add_sensor_checks_uniqueness() {
        let mut v = Vehicle::new("r1", Pose::identity(), Twist::default());
        let owner = SensorOwner {
            name: "r1",
            sensor_count: 0,
            base_path: Path::new("."),
        };
        v.add_sensor(LaserScanner::create(&owner, &sensor("laser", None)).unwrap()).unwrap();
        assert!(v.add_sensor(LaserScanner::create(&owner, &sensor("laser", None)).unwrap()).is_err());
        assert!(v.check_unique_sensor_names().is_ok());
        assert!(v.sensor("laser1").is_some());
    }
    
    #[test]
    fn test_element_properties() {
        let node = ConfigNode::new("element")
            .with_attr("class", "ground_grid")
            .with_attr("color", "#808080")
            .with_param("spacing", "1.0");
        let e = WorldElement::from_config(&node).unwrap();
        assert_eq!(e.class(), "ground_grid");
        assert_eq!(e.property("color"), Some("#808080"));
        assert_eq!(e.property("spacing"), Some("1.0"));
        assert_eq!(e.property("class"), None);
    }
    
    #[test]
    fn test_named_registry_multimap() {
        let mut reg = NamedRegistry::new();
        reg.insert("a", 1);
        reg.insert("b", 2);
        reg.insert("a", 3);
        
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.get("a"), &[1, 3]);
        assert_eq!(reg.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![1, 3, 2]);
        assert_eq!(reg.remove("a"), vec![1, 3]);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.drain(), vec![2]);
        assert!(reg.is_empty());
    }
}
