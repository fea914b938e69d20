//! Simulation context captured by sensors and dispatch jobs.

use crate::observation::Observation;
use fleetsim_env::Transport;
use std::sync::{Arc, PoisonError, RwLock};

/// Extension point invoked for every dispatched observation.
///
/// Called from a dispatch worker, never from the stepping thread, so
/// implementations must not take the world lock.
pub trait ObservationHook: Send + Sync + 'static {
    /// Receives the owning entity name and the new observation.
    fn on_new_observation(&self, owner: &str, obs: &Observation);
}

impl<F> ObservationHook for F
where
    F: Fn(&str, &Observation) + Send + Sync + 'static,
{
    fn on_new_observation(&self, owner: &str, obs: &Observation) {
        self(owner, obs)
    }
}

/// World-wide sinks shared with dispatch jobs.
#[derive(Default)]
pub struct WorldServices {
    hook: RwLock<Option<Arc<dyn ObservationHook>>>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

impl WorldServices {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Installs (or replaces) the observation hook.
    pub fn set_hook(&self, hook: Option<Arc<dyn ObservationHook>>) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = hook;
    }
    
    /// Installs (or removes) the pub/sub transport.
    pub fn set_transport(&self, transport: Option<Arc<dyn Transport>>) {
        *self.transport.write().unwrap_or_else(PoisonError::into_inner) = transport;
    }
    
    /// Returns the current transport, if any.
    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    
    /// Forwards an observation to the hook, if one is installed.
    pub fn notify(&self, owner: &str, obs: &Observation) {
        let hook = self
            .hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook.on_new_observation(owner, obs);
        }
    }
}

/// Immutable snapshot of the world clock plus its dispatch services.
#[derive(Clone)]
pub struct SimulationContext {
    /// Seconds since world start
    pub simul_time: f64,
    
    /// Unix time the simulation clock is anchored to
    pub epoch_unix: f64,
    
    /// Hook and transport of the owning world
    pub services: Arc<WorldServices>,
}

impl SimulationContext {
    pub fn new(simul_time: f64, epoch_unix: f64, services: Arc<WorldServices>) -> Self {
        Self {
            simul_time,
            epoch_unix,
            services,
        }
    }
    
    /// Wall-clock equivalent of the simulation time.
    pub fn unix_time(&self) -> f64 {
        self.epoch_unix + self.simul_time
    }
}

impl std::fmt::Debug for SimulationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationContext")
            .field("simul_time", &self.simul_time)
            .field("epoch_unix", &self.epoch_unix)
            .finish_non_exhaustive()
    }
}
