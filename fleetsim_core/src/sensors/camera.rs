//! Grayscale depth-shaded camera.
//!
//! Each image column is one ray; nearer obstacles render as taller,
//! brighter bars centered on the horizon. The column ray caster is shared
//! with the depth camera.

use super::{Sensor, SensorBase, SensorContext, SensorOwner};
use crate::config::ConfigNode;
use crate::error::SimError;
use crate::observation::{GrayImage, Observation, ObservationPayload};
use crate::params::ParamReader;
use crate::physics::Pose;
use crate::visual::{SensorVisual, VisualKind, VisualRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct CameraParams {
    pub ncols: u32,
    pub nrows: u32,
    pub fov: f64,
    pub range_max: f64,
    pub pose: Pose,
}

impl CameraParams {
    /// Reads the camera parameters present in `reader`, starting from the defaults.
    pub(super) fn parse(reader: &ParamReader<'_>) -> Result<Self, SimError> {
        let mut params = CameraParams::default();
        if let Some(ncols) = parse_dimension(reader, "ncols")? {
            params.ncols = ncols;
        }
        if let Some(nrows) = parse_dimension(reader, "nrows")? {
            params.nrows = nrows;
        }
        if let Some(fov) = reader.opt_f64("fov_degrees")? {
            if fov <= 0.0 || fov >= 180.0 {
                return Err(SimError::malformed("fov_degrees", format!("must be in (0, 180), got {fov}")));
            }
            params.fov = fov.to_radians();
        }
        if let Some(range_max) = reader.opt_f64("range_max")? {
            if range_max <= 0.0 {
                return Err(SimError::malformed("range_max", format!("must be > 0, got {range_max}")));
            }
            params.range_max = range_max;
        }
        if let Some(pose) = reader.opt_pose("pose")? {
            params.pose = pose;
        }
        Ok(params)
    }
    
    /// Casts one ray per column from the owner-relative mount pose.
    ///
    /// Returns the sensor pose in the world frame and the hit distance per
    /// column, leftmost first.
    pub(super) fn cast_columns(&self, ctx: &SensorContext<'_>) -> (Pose, Vec<Option<f64>>) {
        let sensor_pose = ctx.owner_pose * self.pose;
        let origin = [sensor_pose.translation.vector.x, sensor_pose.translation.vector.y];
        let heading = sensor_pose.rotation.angle();
        
        let hits = (0..self.ncols)
            .map(|col| {
                let frac = if self.ncols > 1 {
                    col as f64 / (self.ncols - 1) as f64
                } else {
                    0.5
                };
                let angle = heading + self.fov / 2.0 - self.fov * frac;
                ctx.scene.ray_cast(origin, angle, self.range_max)
            })
            .collect();
        (sensor_pose, hits)
    }
    
    /// Shades one bar per column hit.
    pub(super) fn shade(&self, hits: &[Option<f64>]) -> GrayImage {
        let mut image = GrayImage::new(self.ncols, self.nrows);
        for (col, dist) in hits.iter().enumerate() {
            let Some(dist) = dist else {
                continue;
            };
            let col = col as u32;
            let closeness = 1.0 - dist / self.range_max;
            let shade = (55.0 + 200.0 * closeness).round() as u8;
            let half = ((self.nrows as f64 / 2.0) * closeness).ceil() as u32;
            let mid = self.nrows / 2;
            let (top, bottom) = (mid.saturating_sub(half), (mid + half).min(self.nrows));
            for row in top..bottom {
                image.pixels[(row * self.ncols + col) as usize] = shade;
            }
        }
        image
    }
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            ncols: 64,
            nrows: 48,
            fov: 60.0_f64.to_radians(),
            range_max: 50.0,
            pose: Pose::identity(),
        }
    }
}

pub struct CameraSensor {
    base: SensorBase,
    params: CameraParams,
}

impl CameraSensor {
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

fn parse_dimension(reader: &ParamReader<'_>, key: &str) -> Result<Option<u32>, SimError> {
    let Some(value) = reader.opt_usize(key)? else {
        return Ok(None);
    };
    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(Some(v)),
        _ => Err(SimError::malformed(key, format!("must be in 1..=u32::MAX, got {value}"))),
    }
}

impl Sensor for CameraSensor {
    fn base(&self) -> &SensorBase {
        &self.base
    }
    
    fn base_mut(&mut self) -> &mut SensorBase {
        &mut self.base
    }
    
    fn class_name(&self) -> &'static str {
        "camera"
    }
    
    fn load_config(&mut self, node: &ConfigNode) -> Result<(), SimError> {
        self.base.load_config(node, "camera")?;
        
        let reader = ParamReader::new(node, self.base.var_values());
        self.params = CameraParams::parse(&reader)?;
        Ok(())
    }
    
    fn compute_observation(&mut self, ctx: &SensorContext<'_>) -> Option<Observation> {
        let (sensor_pose, hits) = self.params.cast_columns(ctx);
        let image = self.params.shade(&hits);
        
        Some(Observation::new(
            self.base.name(),
            ctx.sim.unix_time(),
            &sensor_pose,
            ObservationPayload::Image(image),
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
