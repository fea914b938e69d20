//! Depth camera: the grayscale camera image plus one range per column.

use super::camera::CameraParams;
use super::{Sensor, SensorBase, SensorContext, SensorOwner};
use crate::config::ConfigNode;
use crate::error::SimError;
use crate::observation::{DepthImage, Observation, ObservationPayload};
use crate::params::ParamReader;
use crate::visual::{SensorVisual, VisualKind, VisualRegistry};

pub struct DepthCameraSensor {
    base: SensorBase,
    params: CameraParams,
}

impl DepthCameraSensor {
    pub fn new(owner: &SensorOwner<'_>) -> Self {
        Self {
            base: SensorBase::new(owner),
            params: CameraParams::default(),
        }
    }

    /// Registry constructor.
    pub fn create(owner: &SensorOwner<'_>, node: &ConfigNode) -> Result<Box<dyn Sensor>, SimError> {
        let mut sensor = Self::new(owner);
        sensor.load_config(node)?;
        Ok(Box::new(sensor))
    }

    pub fn params(&self) -> &CameraParams {
        &self.params
    }
}

impl Sensor for DepthCameraSensor {
    fn base(&self) -> &SensorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }

    fn class_name(&self) -> &'static str {
        "rgbd_camera"
    }

    fn load_config(&mut self, node: &ConfigNode) -> Result<(), SimError> {
        self.base.load_config(node, "rgbd_camera")?;
        let reader = ParamReader::new(node, self.base.var_values());
        self.params = CameraParams::parse(&reader)?;
        Ok(())
    }

    fn compute_observation(&mut self, ctx: &SensorContext<'_>) -> Option<Observation> {
        let (sensor_pose, hits) = self.params.cast_columns(ctx);
        let image = self.params.shade(&hits);
        let max_range = self.params.range_max;

        let depth = hits
            .iter()
            .map(|hit| hit.unwrap_or(max_range) as f32)
            .collect();
        let valid = hits.iter().map(Option::is_some).collect();

        Some(Observation::new(
            self.base.name(),
            ctx.sim.unix_time(),
            &sensor_pose,
            ObservationPayload::Depth(DepthImage {
                image,
                max_range,
                depth,
                valid,
            }),
        ))
    }

    fn register_visual(&self, registry: &VisualRegistry) {
        registry.register(SensorVisual::new(
            self.base.owner_name(),
            self.base.name(),
            &self.params.pose,
            VisualKind::Fov {
                aperture: self.params.fov,
                range: self.params.range_max,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{SimulationContext, WorldServices};
    use crate::dispatch::{DispatchConfig, DispatchPool};
    use crate::physics::Pose;
    use crate::scene::{Obstacle, Scene};
    use approx::assert_relative_eq;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_depth_per_column() {
        let owner = SensorOwner {
            name: "r1",
            sensor_count: 0,
            base_path: Path::new("."),
        };
        let mut cam = DepthCameraSensor::new(&owner);
        cam.load_config(
            &ConfigNode::new("sensor")
                .with_param("ncols", "5")
                .with_param("nrows", "4")
                .with_param("range_max", "20"),
        )
        .unwrap();
        assert_eq!(cam.base().name(), "rgbd_camera1");

        let scene = Scene::new(vec![Obstacle {
            name: "b".into(),
            center: [5.0, 0.0],
            radius: 0.5,
        }]);
        let pool = DispatchPool::new(DispatchConfig::default()).unwrap();
        let sim = SimulationContext::new(0.0, 0.0, Arc::new(WorldServices::new()));
        let ctx = SensorContext {
            sim: &sim,
            owner_pose: Pose::identity(),
            scene: &scene,
            dispatch: &pool,
        };

        let obs = cam.compute_observation(&ctx).unwrap();
        let ObservationPayload::Depth(frame) = obs.payload else {
            panic!("expected depth frame");
        };

        assert_eq!(frame.depth.len(), 5);
        assert_eq!(frame.image.width, 5);
        assert!(frame.valid[2]);
        assert_relative_eq!(frame.depth[2], 4.5, epsilon = 1e-4);
        assert!(frame.image.get(2, 2).unwrap() > 0);
        // Edge columns look 30 degrees off axis and miss.
        assert!(!frame.valid[0]);
        assert_eq!(frame.depth[0], 20.0);
    }
}
