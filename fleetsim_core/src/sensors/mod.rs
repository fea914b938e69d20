//! Simulated sensors.
//!
//! Every sensor type implements [`Sensor`] on top of a shared
//! [`SensorBase`]. Types are created by name through the process-wide
//! [`SensorRegistry`]; [`sensor_factory`] is the entry point used when
//! loading entity configuration.
//!
//! Per timestep the owner calls [`Sensor::simul_post_timestep`], which runs
//! the scheduling gate, computes an observation synchronously and hands it
//! to the dispatch pool.

mod base;
mod camera;
mod depth_camera;
mod factory;
mod laser;
mod registry;

pub use base::{SensorBase, SensorId, SinkHealth, SinkKind};
pub use camera::CameraSensor;
pub use depth_camera::DepthCameraSensor;
pub use factory::sensor_factory;
pub use laser::LaserScanner;
pub use registry::{register_builtin_sensors, SensorConstructor, SensorRegistry};

use crate::config::ConfigNode;
use crate::context::SimulationContext;
use crate::dispatch::DispatchPool;
use crate::error::SimError;
use crate::observation::Observation;
use crate::physics::Pose;
use crate::scene::Scene;
use crate::visual::VisualRegistry;
use std::path::Path;
use std::sync::Arc;

/// What a sensor knows about the entity it is being attached to.
#[derive(Debug, Clone, Copy)]
pub struct SensorOwner<'a> {
    pub name: &'a str,
    /// Sensors already attached to the owner
    pub sensor_count: usize,
    /// Directory relative output paths resolve against
    pub base_path: &'a Path,
}

/// Per-timestep inputs handed to a sensor.
pub struct SensorContext<'a> {
    pub sim: &'a SimulationContext,
    pub owner_pose: Pose,
    pub scene: &'a Scene,
    pub dispatch: &'a DispatchPool,
}

/// A simulated sensor mounted on an entity.
pub trait Sensor: Send {
    fn base(&self) -> &SensorBase;
    
    fn base_mut(&mut self) -> &mut SensorBase;
    
    /// Registry tag of this sensor type.
    fn class_name(&self) -> &'static str;
    
    /// Parses common and type-specific configuration.
    fn load_config(&mut self, node: &ConfigNode) -> Result<(), SimError>;
    
    /// Produces a new observation, or `None` when there is nothing to report.
    fn compute_observation(&mut self, ctx: &SensorContext<'_>) -> Option<Observation>;
    
    /// Parses the optional `visual` child.
    fn parse_visual(&mut self, _node: Option<&ConfigNode>) -> Result<(), SimError> {
        Ok(())
    }
    
    /// Adds this sensor's visualization to the world registry.
    fn register_visual(&self, registry: &VisualRegistry);
    
    fn name(&self) -> &str {
        self.base().name()
    }
    
    /// Runs the scheduling gate and, when due, computes and dispatches an
    /// observation. Returns whether a job was submitted.
    fn simul_post_timestep(&mut self, ctx: &SensorContext<'_>) -> bool {
        if !self
            .base_mut()
            .should_trigger(ctx.sim.simul_time, &ctx.owner_pose)
        {
            return false;
        }
        let obs = self.compute_observation(ctx).map(Arc::new);
        self.base().report_new_observation(obs, ctx.sim, ctx.dispatch)
    }
}

impl std::fmt::Debug for dyn Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("class", &self.class_name())
            .field("name", &self.name())
            .finish()
    }
}
