//! World runner - loads a world file and drives it for a fixed duration.

use fleetsim_core::{
    DispatchStats, GuiUpdateParams, Observation, SimError, World, WorldConfig,
};
use fleetsim_env::{LocalBus, ObservationEnvelope};
use crossbeam::channel::Receiver;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that stop a run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The world file could not be read
    #[error("cannot read world file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    
    /// Invalid runner option
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    
    /// World load or GUI failure
    #[error(transparent)]
    Sim(#[from] SimError),
}

/// Options for one run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// World description (XML)
    pub world_path: PathBuf,
    
    /// Simulated seconds to run
    pub duration: f64,
    
    /// Simulated seconds per `run_simulation` call
    pub step: f64,
    
    /// Pace the simulation to the wall clock
    pub realtime: bool,
    
    /// Drive the GUI while running
    pub gui: bool,
    
    /// Topics to count messages on
    pub subscribe: Vec<String>,
    
    /// World construction options
    pub world: WorldConfig,
}

impl RunnerConfig {
    pub fn new(world_path: impl Into<PathBuf>) -> Self {
        Self {
            world_path: world_path.into(),
            duration: 10.0,
            step: 0.05,
            realtime: false,
            gui: false,
            subscribe: Vec::new(),
            world: WorldConfig::default(),
        }
    }
    
    /// Sets the simulated duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = secs;
        self
    }
    
    /// Sets the per-call step.
    pub fn with_step(mut self, secs: f64) -> Self {
        self.step = secs;
        self
    }
    
    /// Adds a topic subscription.
    pub fn with_subscription(mut self, topic: impl Into<String>) -> Self {
        self.subscribe.push(topic.into());
        self
    }
}

/// Result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// World file that was run
    pub world: String,
    
    /// Timesteps executed
    pub steps: u64,
    
    /// Final simulation time in seconds
    pub final_time_secs: f64,
    
    /// Wall-clock duration of the run
    pub wall_time_secs: f64,
    
    /// Observations dispatched, by vehicle
    pub observations: BTreeMap<String, u64>,
    
    /// Messages received, by subscribed topic
    pub messages: BTreeMap<String, u64>,
    
    /// Dispatch pool counters
    pub dispatch: DispatchStats,
}

struct Subscription {
    topic: String,
    rx: Receiver<ObservationEnvelope>,
    received: u64,
}

impl Subscription {
    fn drain(&mut self) {
        let n = self.rx.try_iter().count() as u64;
        self.received += n;
    }
}

/// Loads a world and runs it.
pub struct SimRunner {
    config: RunnerConfig,
    world: World,
    bus: Arc<LocalBus>,
    observations: Arc<Mutex<BTreeMap<String, u64>>>,
    subscriptions: Vec<Subscription>,
}

impl SimRunner {
    /// Builds the world described by `config.world_path`.
    pub fn new(config: RunnerConfig) -> Result<Self, RunnerError> {
        if !(config.duration.is_finite() && config.duration >= 0.0) {
            return Err(RunnerError::InvalidArgument(format!(
                "duration must be >= 0, got {}",
                config.duration
            )));
        }
        if !(config.step.is_finite() && config.step > 0.0) {
            return Err(RunnerError::InvalidArgument(format!(
                "step must be > 0, got {}",
                config.step
            )));
        }
        
        let text = std::fs::read_to_string(&config.world_path).map_err(|source| RunnerError::Io {
            path: config.world_path.clone(),
            source,
        })?;
        let base_path = config
            .world_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        
        let world = World::new(config.world.clone())?;
        
        // Subscribers and transport must exist before topics are advertised at load.
        let bus = LocalBus::shared();
        let subscriptions = config
            .subscribe
            .iter()
            .map(|topic| Subscription {
                topic: topic.clone(),
                rx: bus.subscribe(topic),
                received: 0,
            })
            .collect();
        world.set_transport(Some(bus.clone()));
        
        let observations: Arc<Mutex<BTreeMap<String, u64>>> = Arc::default();
        let counter = Arc::clone(&observations);
        world.set_observation_hook(Some(Arc::new(move |owner: &str, _obs: &Observation| {
            *counter
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(owner.to_string())
                .or_default() += 1;
        })));
        
        world.load_from_xml(&text, &base_path)?;
        info!(world = %config.world_path.display(), topics = ?bus.topics(), "world ready");
        
        Ok(Self {
            config,
            world,
            bus,
            observations,
            subscriptions,
        })
    }
    
    pub fn world(&self) -> &World {
        &self.world
    }
    
    pub fn bus(&self) -> &Arc<LocalBus> {
        &self.bus
    }
    
    /// Runs until the configured duration elapsed or the GUI was closed.
    pub fn run(&mut self) -> Result<RunSummary, RunnerError> {
        let wall_start = Instant::now();
        let sim_start = self.world.get_simul_time();
        let end = sim_start + self.config.duration;
        let mut gui_params = GuiUpdateParams::default();
        let mut calls: u64 = 0;
        
        while self.world.get_simul_time() + 1e-9 < end {
            self.world.run_simulation(self.config.step);
            calls += 1;
            
            if self.config.realtime {
                let target = Duration::from_secs_f64(self.world.get_simul_time() - sim_start);
                if let Some(wait) = target.checked_sub(wall_start.elapsed()) {
                    std::thread::sleep(wait);
                }
            }
            
            if self.config.gui {
                gui_params.msg_lines = format!(
                    "t = {:.3} s | {} observations dispatched",
                    self.world.get_simul_time(),
                    self.world.dispatch_stats().submitted
                );
                self.world.update_gui(Some(&mut gui_params))?;
                if let Some(key) = gui_params.key_event.take() {
                    debug!(key = ?key.as_char(), "key pressed");
                }
                if !self.world.is_gui_open() {
                    info!("GUI closed, stopping run");
                    break;
                }
            }
            
            if calls % 20 == 0 {
                debug!(t = self.world.get_simul_time(), steps = self.world.step_count(), "running");
            }
            for sub in &mut self.subscriptions {
                sub.drain();
            }
        }
        
        self.world.flush_dispatch();
        for sub in &mut self.subscriptions {
            sub.drain();
        }
        self.world.close_gui();
        
        let summary = RunSummary {
            world: self.config.world_path.display().to_string(),
            steps: self.world.step_count(),
            final_time_secs: self.world.get_simul_time(),
            wall_time_secs: wall_start.elapsed().as_secs_f64(),
            observations: self
                .observations
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            messages: self
                .subscriptions
                .iter()
                .map(|s| (s.topic.clone(), s.received))
                .collect(),
            dispatch: self.world.dispatch_stats(),
        };
        info!(
            steps = summary.steps,
            t = summary.final_time_secs,
            published = self.bus.published_count(),
            "run finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    
    const WORLD: &str = r#"<world>
        <simul_timestep>0.01</simul_timestep>
        <vehicle name="r1">
            <init_vel>0.5 0 10</init_vel>
            <sensor class="laser">
                <sensor_period>0.095</sensor_period>
                <publish><publish_topic>/${PARENT_NAME}/scan</publish_topic></publish>
                <save_to_rawlog>logs_${NAME}.rawlog</save_to_rawlog>
            </sensor>
        </vehicle>
        <block name="b1"><init_pose>5 0 0</init_pose></block>
    </world>"#;
    
    #[test]
    fn test_run_counts_observations_and_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.world.xml");
        fs::write(&path, WORLD).unwrap();
        
        let mut runner = SimRunner::new(
            RunnerConfig::new(&path)
                .with_duration(1.0)
                .with_step(0.1)
                .with_subscription("/r1/scan"),
        )
        .unwrap();
        let summary = runner.run().unwrap();
        
        assert_eq!(summary.steps, 100);
        assert!((summary.final_time_secs - 1.0).abs() < 1e-6);
        assert_eq!(summary.observations["r1"], 10);
        assert_eq!(summary.messages["/r1/scan"], 10);
        assert_eq!(summary.dispatch.completed, 10);
        
        drop(runner);
        assert!(dir.path().join("logs_laser1.rawlog").exists());
    }
    
    #[test]
    fn test_missing_world_file() {
        let err = SimRunner::new(RunnerConfig::new("/nonexistent/world.xml")).err().unwrap();
        assert!(matches!(err, RunnerError::Io { .. }));
    }
    
    #[test]
    fn test_bad_step_rejected() {
        let err = SimRunner::new(RunnerConfig::new("x.xml").with_step(0.0)).err().unwrap();
        assert!(matches!(err, RunnerError::InvalidArgument(_)));
    }
}
