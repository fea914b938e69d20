//! Planar 2D laser scanner.
//!
//! Casts `nrays` rays evenly over `fov_degrees` against the scene's
//! obstacles and adds zero-mean Gaussian range noise.

use super::{Sensor, SensorBase, SensorContext, SensorOwner};
use crate::config::ConfigNode;
use crate::error::SimError;
use crate::observation::{Observation, ObservationPayload, RangeScan};
use crate::params::ParamReader;
use crate::physics::Pose;
use crate::visual::{SensorVisual, VisualKind, VisualRegistry};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Laser scanner parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LaserParams {
    pub fov: f64,
    pub nrays: usize,
    pub range_max: f64,
    pub range_std_noise: f64,
    /// Mounting pose on the owner
    pub pose: Pose,
}

impl Default for LaserParams {
    fn default() -> Self {
        Self {
            fov: 180.0_f64.to_radians(),
            nrays: 181,
            range_max: 80.0,
            range_std_noise: 0.01,
            pose: Pose::identity(),
        }
    }
}

pub struct LaserScanner {
    base: SensorBase,
    params: LaserParams,
    noise: Option<Normal<f64>>,
    rng: ChaCha8Rng,
    show_fov: bool,
}

impl LaserScanner {
    pub fn new(owner: &SensorOwner<'_>) -> Self {
        let base = SensorBase::new(owner);
        let rng = ChaCha8Rng::seed_from_u64(base.id().0);
        Self {
            base,
            params: LaserParams::default(),
            noise: None,
            rng,
            show_fov: false,
        }
    }
    
    /// Registry constructor.
    pub fn create(owner: &SensorOwner<'_>, node: &ConfigNode) -> Result<Box<dyn Sensor>, SimError> {
        let mut sensor = Self::new(owner);
        sensor.load_config(node)?;
        Ok(Box::new(sensor))
    }
    
    pub fn params(&self) -> &LaserParams {
        &self.params
    }
    
    /// Bearing of ray `i` relative to the sensor heading.
    fn ray_angle(&self, i: usize) -> f64 {
        if self.params.nrays < 2 {
            return 0.0;
        }
        -self.params.fov / 2.0 + self.params.fov * i as f64 / (self.params.nrays - 1) as f64
    }
}

impl Sensor for LaserScanner {
    fn base(&self) -> &SensorBase {
        &self.base
    }
    
    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }
    
    fn class_name(&self) -> &'static str {
        "laser"
    }
    
    fn load_config(&mut self, node: &ConfigNode) -> Result<(), SimError> {
        self.base.load_config(node, "laser")?;
        
        let reader = ParamReader::new(node, self.base.var_values());
        let mut params = LaserParams::default();
        if let Some(fov) = reader.opt_f64("fov_degrees")? {
            if fov <= 0.0 || fov > 360.0 {
                return Err(SimError::malformed("fov_degrees", format!("must be in (0, 360], got {fov}")));
            }
            params.fov = fov.to_radians();
        }
        if let Some(nrays) = reader.opt_usize("nrays")? {
            if nrays == 0 {
                return Err(SimError::malformed("nrays", "must be at least 1"));
            }
            params.nrays = nrays;
        }
        if let Some(range_max) = reader.opt_f64("range_max")? {
            if range_max <= 0.0 {
                return Err(SimError::malformed("range_max", format!("must be > 0, got {range_max}")));
            }
            params.range_max = range_max;
        }
        if let Some(std) = reader.opt_f64("range_std_noise")? {
            if std < 0.0 {
                return Err(SimError::malformed("range_std_noise", format!("must be >= 0, got {std}")));
            }
            params.range_std_noise = std;
        }
        if let Some(pose) = reader.opt_pose("pose")? {
            params.pose = pose;
        }
        
        self.noise = if params.range_std_noise > 0.0 {
            Some(
                Normal::new(0.0, params.range_std_noise)
                    .map_err(|e| SimError::malformed("range_std_noise", e.to_string()))?,
            )
        } else {
            None
        };
        self.params = params;
        Ok(())
    }
    
    fn compute_observation(&mut self, ctx: &SensorContext<'_>) -> Option<Observation> {
        let sensor_pose = ctx.owner_pose * self.params.pose;
        let origin = [sensor_pose.translation.vector.x, sensor_pose.translation.vector.y];
        let heading = sensor_pose.rotation.angle();
        
        let mut ranges = Vec::with_capacity(self.params.nrays);
        let mut valid = Vec::with_capacity(self.params.nrays);
        for i in 0..self.params.nrays {
            let angle = heading + self.ray_angle(i);
            match ctx.scene.ray_cast(origin, angle, self.params.range_max) {
                Some(d) => {
                    let noise = self.noise.map_or(0.0, |n| n.sample(&mut self.rng));
                    ranges.push((d + noise).clamp(0.0, self.params.range_max) as f32);
                    valid.push(true);
                }
                None => {
                    ranges.push(self.params.range_max as f32);
                    valid.push(false);
                }
            }
        }
        
        Some(Observation::new(
            self.base.name(),
            ctx.sim.unix_time(),
            &sensor_pose,
            ObservationPayload::RangeScan(RangeScan {
                aperture: self.params.fov,
                max_range: self.params.range_max,
                ranges,
                valid,
            }),
        ))
    }
    
    fn parse_visual(&mut self, node: Option<&ConfigNode>) -> Result<(), SimError> {
        if let Some(node) = node {
            let reader = ParamReader::new(node, self.base.var_values());
            self.show_fov = reader.attr_bool("show_fov")?.unwrap_or(true);
        }
        Ok(())
    }
    
    fn register_visual(&self, registry: &VisualRegistry) {
        let kind = if self.show_fov {
            VisualKind::Fov {
                aperture: self.params.fov,
                range: self.params.range_max,
            }
        } else {
            VisualKind::Origin
        };
        registry.register(SensorVisual::new(
            self.base.owner_name(),
            self.base.name(),
            &self.params.pose,
            kind,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SimulationContext, WorldServices};
    use crate::dispatch::{DispatchConfig, DispatchPool};
    use crate::scene::{Obstacle, Scene};
    use approx::assert_relative_eq;
    use std::path::Path;
    use std::sync::Arc;
    
    fn laser(node: ConfigNode) -> LaserScanner {
        let owner = SensorOwner {
            name: "r1",
            sensor_count: 0,
            base_path: Path::new("."),
        };
        let mut laser = LaserScanner::new(&owner);
        laser.load_config(&node).unwrap();
        laser
    }
    
    fn scan(laser: &mut LaserScanner, scene: &Scene) -> RangeScan {
        let pool = DispatchPool::new(DispatchConfig::default()).unwrap();
        let sim = SimulationContext::new(1.0, 100.0, Arc::new(WorldServices::new()));
        let ctx = SensorContext {
            sim: &sim,
            owner_pose: Pose::identity(),
            scene,
            dispatch: &pool,
        };
        let obs = laser.compute_observation(&ctx).unwrap();
        assert_eq!(obs.timestamp, 101.0);
        match obs.payload {
            ObservationPayload::RangeScan(scan) => scan,
            other => panic!("unexpected payload {other:?}"),
        }
    }
    
    #[test]
    fn test_defaults() {
        let l = laser(ConfigNode::new("sensor"));
        assert_eq!(l.params().nrays, 181);
        assert_relative_eq!(l.params().range_max, 80.0);
        assert_relative_eq!(l.params().fov, std::f64::consts::PI);
    }
    
    #[test]
    fn test_center_ray_hits_block() {
        let mut l = laser(
            ConfigNode::new("sensor")
                .with_param("nrays", "3")
                .with_param("range_std_noise", "0"),
        );
        let scene = Scene::new(vec![Obstacle {
            name: "b".into(),
            center: [10.0, 0.0],
            radius: 1.0,
        }]);
        
        let scan = scan(&mut l, &scene);
        
        assert_eq!(scan.valid, vec![false, true, false]);
        assert_relative_eq!(scan.ranges[1], 9.0, epsilon = 1e-5);
        assert_relative_eq!(scan.ranges[0], 80.0);
    }
    
    #[test]
    fn test_negative_noise_rejected() {
        let owner = SensorOwner {
            name: "r1",
            sensor_count: 0,
            base_path: Path::new("."),
        };
        let mut l = LaserScanner::new(&owner);
        let err = l
            .load_config(&ConfigNode::new("sensor").with_param("range_std_noise", "-0.1"))
            .unwrap_err();
        assert_eq!(err.field(), Some("range_std_noise"));
    }
    
    #[test]
    fn test_fov_visual() {
        let mut l = laser(ConfigNode::new("sensor"));
        l.parse_visual(Some(&ConfigNode::new("visual"))).unwrap();
        let registry = VisualRegistry::new();
        l.register_visual(&registry);
        
        let visuals = registry.snapshot();
        assert_eq!(visuals.len(), 1);
        assert!(matches!(visuals[0].kind, VisualKind::Fov { .. }));
    }
}
