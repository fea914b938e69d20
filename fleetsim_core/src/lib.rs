//! FleetSim Core - sensor scheduling and world coordination
//!
//! A fixed-timestep world of vehicles, blocks and passive elements. Each
//! vehicle carries sensors that are gated by their own period, compute an
//! observation on the stepping thread and hand it to a bounded dispatch
//! pool. Dispatch workers fan the observation out to three sinks:
//! 1. **Observation hook**: the world-level `on_new_observation` callback
//! 2. **Pub/sub**: an `ObservationEnvelope` published on the sensor topic
//! 3. **Rawlog**: an LZ4-compressed, length-prefixed record file

pub mod config;
pub mod context;
pub mod dispatch;
pub mod entities;
pub mod error;
pub mod gui;
pub mod observation;
pub mod params;
pub mod physics;
pub mod rawlog;
pub mod scene;
pub mod sensors;
pub mod visual;
pub mod world;

// Re-export key types for convenience
pub use config::ConfigNode;
pub use context::{ObservationHook, SimulationContext, WorldServices};
pub use dispatch::{DispatchConfig, DispatchPool, DispatchStats, OverflowPolicy};
pub use entities::{Block, NamedRegistry, Vehicle, WorldElement};
pub use error::SimError;
pub use gui::{GuiBackend, GuiBackendFactory, GuiOptions, GuiState, GuiUpdateParams, KeyEvent, SceneSnapshot};
pub use observation::{Observation, ObservationPayload, ObservationPtr};
pub use physics::{BodyId, KinematicEngine, PhysicsEngine, Pose, Twist};
pub use rawlog::{RawlogReader, RawlogWriter};
pub use sensors::{sensor_factory, register_builtin_sensors, Sensor, SensorBase, SensorRegistry};
pub use visual::{SensorVisual, VisualRegistry};
pub use world::{World, WorldConfig, WorldGuard, WorldState};
