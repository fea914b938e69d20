//! The simulated world.
//!
//! A [`World`] owns the entity registries and the physics engine behind one
//! coarse, non-reentrant lock, a lock-free simulation clock, the dispatch
//! pool that runs observation sinks, and the optional GUI thread.
//!
//! ```text
//!   run_simulation(dt)
//!     └─ n × timestep, each under the world lock:
//!          physics.step → clock += ts → vehicle poses → sensor gates
//!                                                        └─► DispatchPool
//! ```

mod loader;

pub use loader::{parse_world, WorldDescription};

use crate::context::{ObservationHook, SimulationContext, WorldServices};
use crate::dispatch::{DispatchConfig, DispatchPool, DispatchStats};
use crate::entities::{Block, NamedRegistry, Vehicle, WorldElement};
use crate::error::SimError;
use crate::gui::{
    default_gui_backend, GuiBackendFactory, GuiCoordinator, GuiOptions, GuiState,
    GuiUpdateParams, SceneSnapshot, SnapshotFn, VehicleSnapshot,
};
use crate::physics::{KinematicEngine, PhysicsEngine, Twist};
use crate::scene::Scene;
use crate::visual::VisualRegistry;
use fleetsim_env::Transport;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default fixed timestep (seconds).
pub const DEFAULT_SIMUL_TIMESTEP: f64 = 0.005;

/// Default gravity (m/s²).
pub const DEFAULT_GRAVITY: f64 = 9.81;

/// World construction options.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub simul_timestep: f64,
    pub gravity: f64,
    pub dispatch: DispatchConfig,
    pub gui: GuiOptions,
    /// Unix time of simulation time zero; `None` uses the wall clock
    pub epoch_unix: Option<f64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            simul_timestep: DEFAULT_SIMUL_TIMESTEP,
            gravity: DEFAULT_GRAVITY,
            dispatch: DispatchConfig::default(),
            gui: GuiOptions::default(),
            epoch_unix: None,
        }
    }
}

/// `f64` stored as bits for lock-free reads.
#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }
    
    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
    
    fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Release);
    }
}

fn check_positive(field: &str, value: f64) -> Result<(), SimError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(SimError::malformed(field, format!("must be finite and > 0, got {value}")));
    }
    Ok(())
}

/// Registries and physics, guarded by the world lock.
pub struct WorldState {
    physics: Box<dyn PhysicsEngine>,
    vehicles: NamedRegistry<Vehicle>,
    blocks: NamedRegistry<Block>,
    world_elements: Vec<WorldElement>,
    gui_options: GuiOptions,
}

impl WorldState {
    fn new(physics: Box<dyn PhysicsEngine>, gui_options: GuiOptions) -> Self {
        Self {
            physics,
            vehicles: NamedRegistry::new(),
            blocks: NamedRegistry::new(),
            world_elements: Vec::new(),
            gui_options,
        }
    }
    
    pub fn vehicles(&self) -> &NamedRegistry<Vehicle> {
        &self.vehicles
    }
    
    pub fn blocks(&self) -> &NamedRegistry<Block> {
        &self.blocks
    }
    
    pub fn world_elements(&self) -> &[WorldElement] {
        &self.world_elements
    }
    
    pub fn physics(&self) -> &dyn PhysicsEngine {
        self.physics.as_ref()
    }
    
    pub fn gui_options(&self) -> &GuiOptions {
        &self.gui_options
    }
    
    /// Obstacles visible to sensors.
    pub fn scene(&self) -> Scene {
        Scene::new(self.blocks.values().map(Block::obstacle).collect())
    }
    
    fn insert_vehicle(
        &mut self,
        mut vehicle: Vehicle,
        services: &WorldServices,
        visuals: &VisualRegistry,
    ) {
        let body = self.physics.add_body(*vehicle.pose(), *vehicle.twist());
        vehicle.set_body(Some(body));
        
        if let Some(transport) = services.transport() {
            for sensor in vehicle.sensors() {
                let topic = sensor.base().publish_topic();
                if topic.is_empty() {
                    continue;
                }
                match transport.advertise(topic) {
                    Ok(()) => tracing::debug!(vehicle = vehicle.name(), topic, "topic advertised"),
                    Err(e) => tracing::warn!(vehicle = vehicle.name(), topic, "cannot advertise topic: {e}"),
                }
            }
        }
        
        vehicle.register_visuals(visuals);
        let name = vehicle.name().to_string();
        self.vehicles.insert(name, vehicle);
    }
    
    fn insert_block(&mut self, mut block: Block) {
        let body = self.physics.add_body(*block.pose(), Twist::default());
        block.set_body(Some(body));
        let name = block.name().to_string();
        self.blocks.insert(name, block);
    }
    
    fn clear(&mut self) {
        self.vehicles.clear();
        self.blocks.clear();
        self.world_elements.clear();
        self.physics.clear();
    }
}

/// Exclusive access to the world registries.
///
/// Holding a guard blocks stepping and GUI snapshots. The world lock is not
/// reentrant: do not call locking [`World`] methods while a guard is alive.
pub struct WorldGuard<'a> {
    state: MutexGuard<'a, WorldState>,
    world: &'a World,
}

impl Deref for WorldGuard<'_> {
    type Target = WorldState;
    
    fn deref(&self) -> &WorldState {
        &self.state
    }
}

impl WorldGuard<'_> {
    /// Drops every entity and resets the clock, for callers already
    /// holding the lock.
    ///
    /// In-flight dispatch jobs finish before sensors are released.
    pub fn clear_all(&mut self) {
        self.world.dispatch.flush();
        self.state.clear();
        self.world.simul_time.set(0.0);
        self.world.visuals.clear();
        tracing::debug!("world cleared");
    }
}

/// Visitor over vehicles, run with the world lock held.
pub trait VehicleVisitor {
    fn visit(&mut self, vehicle: &mut Vehicle);
}

impl<F: FnMut(&mut Vehicle)> VehicleVisitor for F {
    fn visit(&mut self, vehicle: &mut Vehicle) {
        self(vehicle)
    }
}

/// Visitor over world elements, run with the world lock held.
pub trait WorldElementVisitor {
    fn visit(&mut self, element: &mut WorldElement);
}

impl<F: FnMut(&mut WorldElement)> WorldElementVisitor for F {
    fn visit(&mut self, element: &mut WorldElement) {
        self(element)
    }
}

/// Visitor over blocks, run with the world lock held.
pub trait BlockVisitor {
    fn visit(&mut self, block: &mut Block);
}

impl<F: FnMut(&mut Block)> BlockVisitor for F {
    fn visit(&mut self, block: &mut Block) {
        self(block)
    }
}

/// A multi-agent world stepped at a fixed timestep.
pub struct World {
    state: Arc<Mutex<WorldState>>,
    simul_time: Arc<AtomicF64>,
    timestep: AtomicF64,
    gravity: AtomicF64,
    epoch_unix: f64,
    steps: AtomicU64,
    services: Arc<WorldServices>,
    visuals: Arc<VisualRegistry>,
    dispatch: DispatchPool,
    gui: GuiCoordinator,
    gui_factory: Mutex<GuiBackendFactory>,
}

impl World {
    /// Creates an empty world with the built-in kinematic engine.
    pub fn new(config: WorldConfig) -> Result<Self, SimError> {
        Self::with_physics(config, Box::new(KinematicEngine::new()))
    }
    
    /// Creates an empty world around a caller-provided physics engine.
    pub fn with_physics(
        config: WorldConfig,
        physics: Box<dyn PhysicsEngine>,
    ) -> Result<Self, SimError> {
        check_positive("simul_timestep", config.simul_timestep)?;
        let epoch_unix = match config.epoch_unix {
            Some(epoch) => epoch,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default(),
        };
        
        tracing::info!(
            timestep = config.simul_timestep,
            gravity = config.gravity,
            workers = config.dispatch.workers,
            "world created"
        );
        
        Ok(Self {
            state: Arc::new(Mutex::new(WorldState::new(physics, config.gui))),
            simul_time: Arc::new(AtomicF64::new(0.0)),
            timestep: AtomicF64::new(config.simul_timestep),
            gravity: AtomicF64::new(config.gravity),
            epoch_unix,
            steps: AtomicU64::new(0),
            services: Arc::new(WorldServices::new()),
            visuals: Arc::new(VisualRegistry::new()),
            dispatch: DispatchPool::new(config.dispatch)?,
            gui: GuiCoordinator::new(),
            gui_factory: Mutex::new(default_gui_backend()),
        })
    }
    
    /// Takes the world lock.
    pub fn lock(&self) -> WorldGuard<'_> {
        WorldGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
            world: self,
        }
    }
    
    /// Seconds of simulated time since start (or the last `clear_all`).
    pub fn get_simul_time(&self) -> f64 {
        self.simul_time.get()
    }
    
    pub fn get_simul_timestep(&self) -> f64 {
        self.timestep.get()
    }
    
    pub fn set_simul_timestep(&self, timestep: f64) -> Result<(), SimError> {
        check_positive("simul_timestep", timestep)?;
        self.timestep.set(timestep);
        Ok(())
    }
    
    pub fn get_gravity(&self) -> f64 {
        self.gravity.get()
    }
    
    pub fn set_gravity(&self, gravity: f64) {
        self.gravity.set(gravity);
    }
    
    /// Unix time of simulation time zero.
    pub fn epoch_unix(&self) -> f64 {
        self.epoch_unix
    }
    
    /// Total timesteps run so far.
    pub fn step_count(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }
    
    /// Advances the simulation by at least `dt` seconds.
    ///
    /// Runs `max(1, ceil(dt / timestep))` fixed timesteps; the timestep is
    /// a floor, so a `dt` shorter than one timestep still advances by one.
    /// Returns the number of timesteps run. A non-finite `dt` runs a
    /// single step.
    pub fn run_simulation(&self, dt: f64) -> usize {
        let ts = self.get_simul_timestep();
        let n = if dt.is_finite() {
            ((dt / ts) - 1e-9).ceil().max(1.0) as usize
        } else {
            tracing::warn!(dt, "non-finite dt, running a single timestep");
            1
        };
        
        let mut fired = 0;
        for _ in 0..n {
            fired += self.internal_one_timestep(ts);
        }
        tracing::trace!(dt, steps = n, fired, t = self.get_simul_time(), "run_simulation");
        n
    }
    
    fn internal_one_timestep(&self, ts: f64) -> usize {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        
        state.physics.step(ts);
        let t = self.simul_time.get() + ts;
        self.simul_time.set(t);
        self.steps.fetch_add(1, Ordering::Relaxed);
        
        let sim = SimulationContext::new(t, self.epoch_unix, Arc::clone(&self.services));
        let scene = state.scene();
        
        let mut fired = 0;
        for vehicle in state.vehicles.values_mut() {
            if let Some(pose) = vehicle.body().and_then(|b| state.physics.body_pose(b)) {
                vehicle.set_pose(pose);
            }
            fired += vehicle.simulate_sensors(&sim, &scene, &self.dispatch);
        }
        fired
    }
    
    /// Registers a vehicle: adds its body, advertises its sensor topics and
    /// registers its visuals. Sensor names must be unique on the vehicle.
    pub fn add_vehicle(&self, vehicle: Vehicle) -> Result<(), SimError> {
        vehicle.check_unique_sensor_names()?;
        let mut guard = self.lock();
        guard.state.insert_vehicle(vehicle, &self.services, &self.visuals);
        Ok(())
    }
    
    pub fn add_block(&self, block: Block) {
        self.lock().state.insert_block(block);
    }
    
    pub fn add_world_element(&self, element: WorldElement) {
        self.lock().state.world_elements.push(element);
    }
    
    /// Removes every vehicle named `name`. Returns how many were removed.
    pub fn remove_vehicle(&self, name: &str) -> usize {
        let mut guard = self.lock();
        if !guard.vehicles.contains(name) {
            return 0;
        }
        self.dispatch.flush();
        let removed = guard.state.vehicles.remove(name);
        for vehicle in &removed {
            if let Some(body) = vehicle.body() {
                guard.state.physics.remove_body(body);
            }
        }
        self.visuals.remove_owner(name);
        removed.len()
    }
    
    /// Removes every block named `name`. Returns how many were removed.
    pub fn remove_block(&self, name: &str) -> usize {
        let mut guard = self.lock();
        let removed = guard.state.blocks.remove(name);
        for block in &removed {
            if let Some(body) = block.body() {
                guard.state.physics.remove_body(body);
            }
        }
        removed.len()
    }
    
    /// Replaces the world with the one described by `text`.
    ///
    /// Relative sensor output paths resolve against `base_path`. The
    /// description is parsed fully before anything is applied: on error the
    /// world is left unchanged.
    pub fn load_from_xml(&self, text: &str, base_path: &Path) -> Result<(), SimError> {
        let desc = parse_world(text, base_path)?;
        
        let mut guard = self.lock();
        guard.clear_all();
        if let Some(ts) = desc.simul_timestep {
            self.timestep.set(ts);
        }
        if let Some(g) = desc.gravity {
            self.gravity.set(g);
        }
        guard.state.gui_options = desc.gui;
        
        let (n_vehicles, n_blocks, n_elements) =
            (desc.vehicles.len(), desc.blocks.len(), desc.elements.len());
        for vehicle in desc.vehicles {
            guard.state.insert_vehicle(vehicle, &self.services, &self.visuals);
        }
        for block in desc.blocks {
            guard.state.insert_block(block);
        }
        guard.state.world_elements.extend(desc.elements);
        
        tracing::info!(
            vehicles = n_vehicles,
            blocks = n_blocks,
            elements = n_elements,
            timestep = self.get_simul_timestep(),
            "world loaded"
        );
        Ok(())
    }
    
    /// Drops every entity and resets the clock.
    pub fn clear_all(&self) {
        self.lock().clear_all();
    }
    
    /// Runs `visitor` on every vehicle. Do not call locking world APIs from it.
    pub fn run_visitor_on_vehicles<V: VehicleVisitor + ?Sized>(&self, visitor: &mut V) {
        let mut guard = self.lock();
        for vehicle in guard.state.vehicles.values_mut() {
            visitor.visit(vehicle);
        }
    }
    
    /// Runs `visitor` on every world element. Do not call locking world APIs from it.
    pub fn run_visitor_on_world_elements<V: WorldElementVisitor + ?Sized>(&self, visitor: &mut V) {
        let mut guard = self.lock();
        for element in guard.state.world_elements.iter_mut() {
            visitor.visit(element);
        }
    }
    
    /// Runs `visitor` on every block. Do not call locking world APIs from it.
    pub fn run_visitor_on_blocks<V: BlockVisitor + ?Sized>(&self, visitor: &mut V) {
        let mut guard = self.lock();
        for block in guard.state.blocks.values_mut() {
            visitor.visit(block);
        }
    }
    
    /// Installs the observation hook (`None` removes it).
    pub fn set_observation_hook(&self, hook: Option<Arc<dyn ObservationHook>>) {
        self.services.set_hook(hook);
    }
    
    /// Installs the pub/sub transport.
    ///
    /// Topics are advertised when vehicles are registered, so set the
    /// transport before loading.
    pub fn set_transport(&self, transport: Option<Arc<dyn Transport>>) {
        self.services.set_transport(transport);
    }
    
    /// Replaces the backend used when the GUI thread starts.
    pub fn set_gui_backend(&self, factory: GuiBackendFactory) {
        *self.gui_factory.lock().unwrap_or_else(PoisonError::into_inner) = factory;
    }
    
    pub fn visual_registry(&self) -> &Arc<VisualRegistry> {
        &self.visuals
    }
    
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatch.stats()
    }
    
    /// Waits for every queued sink job.
    pub fn flush_dispatch(&self) {
        self.dispatch.flush();
    }
    
    /// Starts the GUI on first call and exchanges messages and key events.
    pub fn update_gui(&self, params: Option<&mut GuiUpdateParams>) -> Result<(), SimError> {
        if self.gui.state() == GuiState::NotStarted {
            let options = self.lock().gui_options.clone();
            let factory = self
                .gui_factory
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if self.gui.start(options, factory, self.snapshot_fn())? {
                tracing::info!("GUI started");
            }
        }
        if let Some(params) = params {
            self.gui.exchange(params);
        }
        Ok(())
    }
    
    pub fn is_gui_open(&self) -> bool {
        self.gui.is_open()
    }
    
    /// Stops the GUI thread. Idempotent.
    pub fn close_gui(&self) {
        self.gui.close();
    }
    
    /// Current scene as drawn by the GUI.
    pub fn snapshot(&self) -> SceneSnapshot {
        (self.snapshot_fn())()
    }
    
    fn snapshot_fn(&self) -> SnapshotFn {
        let state = Arc::clone(&self.state);
        let simul_time = Arc::clone(&self.simul_time);
        let visuals = Arc::clone(&self.visuals);
        Arc::new(move || {
            let state = state.lock().unwrap_or_else(PoisonError::into_inner);
            SceneSnapshot {
                simul_time: simul_time.get(),
                vehicles: state
                    .vehicles
                    .values()
                    .map(|v| VehicleSnapshot {
                        name: v.name().to_string(),
                        pose: [
                            v.pose().translation.vector.x,
                            v.pose().translation.vector.y,
                            v.pose().rotation.angle(),
                        ],
                        sensor_count: v.sensors().len(),
                    })
                    .collect(),
                blocks: state.scene().obstacles,
                world_elements: state.world_elements.len(),
                visuals: visuals.snapshot(),
                ..Default::default()
            }
        })
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.gui.close();
        self.dispatch.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigNode;
    use approx::assert_relative_eq;
    use std::path::Path;
    
    fn world() -> World {
        World::new(WorldConfig {
            epoch_unix: Some(0.0),
            ..Default::default()
        })
        .unwrap()
    }
    
    fn vehicle(name: &str) -> Vehicle {
        let node = ConfigNode::new("vehicle")
            .with_attr("name", name)
            .with_param("init_vel", "1 0 0")
            .with_child(ConfigNode::new("sensor").with_attr("class", "laser"));
        Vehicle::from_config(&node, Path::new(".")).unwrap()
    }
    
    #[test]
    fn test_defaults() {
        let w = world();
        assert_eq!(w.get_simul_timestep(), DEFAULT_SIMUL_TIMESTEP);
        assert_eq!(w.get_gravity(), DEFAULT_GRAVITY);
        assert_eq!(w.get_simul_time(), 0.0);
    }
    
    #[test]
    fn test_short_dt_runs_one_step() {
        let w = world();
        assert_eq!(w.run_simulation(0.001), 1);
        assert_relative_eq!(w.get_simul_time(), 0.005);
        assert_eq!(w.run_simulation(0.0), 1);
        assert_eq!(w.run_simulation(f64::NAN), 1);
        assert_eq!(w.step_count(), 3);
    }
    
    #[test]
    fn test_infinite_dt_runs_one_step() {
        let w = world();
        assert_eq!(w.run_simulation(f64::INFINITY), 1);
        assert_eq!(w.run_simulation(f64::NEG_INFINITY), 1);
        assert_eq!(w.step_count(), 2);
        assert_relative_eq!(w.get_simul_time(), 0.01);
    }
    
    #[test]
    fn test_dt_rounds_up_to_whole_steps() {
        let w = world();
        assert_eq!(w.run_simulation(0.01), 2);
        assert_eq!(w.run_simulation(0.0101), 3);
        assert_relative_eq!(w.get_simul_time(), 0.025, epsilon = 1e-12);
    }
    
    #[test]
    fn test_invalid_timestep_rejected() {
        let w = world();
        assert!(w.set_simul_timestep(0.0).is_err());
        assert!(w.set_simul_timestep(-1.0).is_err());
        w.set_simul_timestep(0.01).unwrap();
        assert_eq!(w.get_simul_timestep(), 0.01);
    }
    
    #[test]
    fn test_vehicle_moves_and_sensor_fires() {
        let w = world();
        w.add_vehicle(vehicle("r1")).unwrap();
        
        w.run_simulation(1.0);
        w.flush_dispatch();
        
        let guard = w.lock();
        let r1 = guard.vehicles().first("r1").unwrap();
        assert_relative_eq!(r1.pose().translation.vector.x, 1.0, epsilon = 1e-6);
        drop(guard);
        assert_eq!(w.dispatch_stats().completed, 200);
    }
    
    #[test]
    fn test_multimap_and_remove() {
        let w = world();
        w.add_vehicle(vehicle("r1")).unwrap();
        w.add_vehicle(vehicle("r1")).unwrap();
        w.add_vehicle(vehicle("r2")).unwrap();
        assert_eq!(w.lock().vehicles().len(), 3);
        assert_eq!(w.visual_registry().len(), 3);
        
        assert_eq!(w.remove_vehicle("r1"), 2);
        assert_eq!(w.remove_vehicle("r1"), 0);
        assert_eq!(w.lock().vehicles().len(), 1);
        assert_eq!(w.lock().physics().body_count(), 1);
        assert_eq!(w.visual_registry().len(), 1);
    }
    
    #[test]
    fn test_blocks_and_elements() {
        let w = world();
        w.add_block(Block::new("b", crate::physics::Pose::identity(), 1.0));
        w.add_world_element(WorldElement::new("ground_grid"));
        
        let mut classes = Vec::new();
        w.run_visitor_on_world_elements(&mut |e: &mut WorldElement| classes.push(e.class().to_string()));
        assert_eq!(classes, vec!["ground_grid"]);
        assert_eq!(w.lock().scene().obstacles.len(), 1);
        assert_eq!(w.remove_block("b"), 1);
    }
    
    #[test]
    fn test_visitor_sees_every_vehicle() {
        let w = world();
        w.add_vehicle(vehicle("a")).unwrap();
        w.add_vehicle(vehicle("b")).unwrap();
        
        let mut names = Vec::new();
        w.run_visitor_on_vehicles(&mut |v: &mut Vehicle| names.push(v.name().to_string()));
        assert_eq!(names, vec!["a", "b"]);
    }
    
    #[test]
    fn test_clear_all_resets() {
        let w = world();
        w.add_vehicle(vehicle("r1")).unwrap();
        w.run_simulation(0.1);
        
        w.clear_all();
        
        assert_eq!(w.get_simul_time(), 0.0);
        assert!(w.lock().vehicles().is_empty());
        assert!(w.visual_registry().is_empty());
        assert_eq!(w.lock().physics().body_count(), 0);
    }
    
    #[test]
    fn test_clear_all_with_lock_held() {
        let w = world();
        w.add_vehicle(vehicle("r1")).unwrap();
        
        let mut guard = w.lock();
        guard.clear_all();
        assert!(guard.vehicles().is_empty());
    }
    
    #[test]
    fn test_failed_load_leaves_world_unchanged() {
        let w = world();
        w.add_vehicle(vehicle("keep")).unwrap();
        
        let bad = r#"<world><vehicle name="x"><sensor class="sonar"/></vehicle></world>"#;
        let err = w.load_from_xml(bad, Path::new(".")).unwrap_err();
        
        assert!(matches!(err, SimError::UnknownSensorType(_)));
        assert!(w.lock().vehicles().contains("keep"));
    }
    
    #[test]
    fn test_load_replaces_world() {
        let w = world();
        w.add_vehicle(vehicle("old")).unwrap();
        let xml = r#"
            <world>
                <simul_timestep>0.01</simul_timestep>
                <vehicle name="new"><sensor class="camera"/></vehicle>
                <block name="b"><init_pose>3 0 0</init_pose></block>
            </world>"#;
        
        w.load_from_xml(xml, Path::new(".")).unwrap();
        
        let guard = w.lock();
        assert!(!guard.vehicles().contains("old"));
        assert!(guard.vehicles().contains("new"));
        assert_eq!(guard.blocks().len(), 1);
        drop(guard);
        assert_eq!(w.get_simul_timestep(), 0.01);
    }
    
    #[test]
    fn test_snapshot() {
        let w = world();
        w.add_vehicle(vehicle("r1")).unwrap();
        w.run_simulation(0.005);
        
        let snap = w.snapshot();
        assert_eq!(snap.vehicles.len(), 1);
        assert_eq!(snap.vehicles[0].sensor_count, 1);
        assert_eq!(snap.visuals.len(), 1);
        assert_relative_eq!(snap.simul_time, 0.005);
    }
}
