//! State and behavior shared by every sensor type.

use super::SensorOwner;
use crate::config::ConfigNode;
use crate::context::SimulationContext;
use crate::dispatch::DispatchPool;
use crate::error::SimError;
use crate::observation::ObservationPtr;
use crate::params::{ParamReader, VarMap};
use crate::physics::Pose;
use crate::rawlog::RawlogWriter;
use fleetsim_env::ObservationEnvelope;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

static NEXT_SENSOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique sensor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SensorId(pub u64);

impl SensorId {
    fn next() -> Self {
        Self(NEXT_SENSOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which sink a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Publish,
    Rawlog,
}

/// Per-sensor sink counters, shared with dispatch jobs.
#[derive(Debug, Default)]
pub struct SinkHealth {
    published: AtomicU64,
    publish_failures: AtomicU64,
    logged: AtomicU64,
    log_failures: AtomicU64,
}

impl SinkHealth {
    fn record_ok(&self, kind: SinkKind) {
        match kind {
            SinkKind::Publish => self.published.fetch_add(1, Ordering::Relaxed),
            SinkKind::Rawlog => self.logged.fetch_add(1, Ordering::Relaxed),
        };
    }
    
    /// Counts a failure, warning on the first and then every 100th.
    fn record_failure(&self, kind: SinkKind, sensor: &str, err: &SimError) {
        let failures = match kind {
            SinkKind::Publish => &self.publish_failures,
            SinkKind::Rawlog => &self.log_failures,
        };
        let count = failures.fetch_add(1, Ordering::Relaxed) + 1;
        if count == 1 || count % 100 == 0 {
            tracing::warn!(sensor, ?kind, failures = count, "sink failed: {err}");
        }
    }
    
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
    
    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }
    
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
    
    pub fn log_failures(&self) -> u64 {
        self.log_failures.load(Ordering::Relaxed)
    }
}

/// Lazily opened rawlog writer.
///
/// Opening is retried on the next append after a failure.
#[derive(Debug)]
struct RawlogSlot {
    path: PathBuf,
    writer: Option<RawlogWriter>,
}

impl RawlogSlot {
    fn append(&mut self, envelope: &ObservationEnvelope) -> Result<(), SimError> {
        if self.writer.is_none() {
            tracing::debug!(path = %self.path.display(), "opening rawlog");
            self.writer = Some(RawlogWriter::create(&self.path)?);
        }
        match self.writer.as_mut() {
            Some(writer) => writer.append(envelope),
            None => Ok(()),
        }
    }
}

/// Common sensor state: identity, scheduling and sink configuration.
#[derive(Debug)]
pub struct SensorBase {
    id: SensorId,
    name: String,
    owner_name: String,
    ordinal: usize,
    base_path: PathBuf,
    period: f64,
    last_trigger_time: f64,
    last_trigger_pose: Pose,
    publish_topic: String,
    rawlog_path: Option<PathBuf>,
    var_values: VarMap,
    rawlog: Option<Arc<Mutex<RawlogSlot>>>,
    health: Arc<SinkHealth>,
}

impl SensorBase {
    /// Creates an unconfigured base attached to `owner`.
    pub fn new(owner: &SensorOwner<'_>) -> Self {
        Self {
            id: SensorId::next(),
            name: String::new(),
            owner_name: owner.name.to_string(),
            ordinal: owner.sensor_count + 1,
            base_path: owner.base_path.to_path_buf(),
            period: 0.0,
            last_trigger_time: f64::NEG_INFINITY,
            last_trigger_pose: Pose::identity(),
            publish_topic: String::new(),
            rawlog_path: None,
            var_values: VarMap::new(),
            rawlog: None,
            health: Arc::new(SinkHealth::default()),
        }
    }
    
    /// Parses the configuration keys common to every sensor type.
    ///
    /// An empty or missing `name` becomes `{prefix}{ordinal}`.
    pub fn load_config(&mut self, node: &ConfigNode, prefix: &str) -> Result<(), SimError> {
        let mut vars = VarMap::from([("PARENT_NAME".to_string(), self.owner_name.clone())]);
        
        let name = ParamReader::new(node, &vars)
            .attr_string("name")
            .map(|n| n.trim().to_string())
            .unwrap_or_default();
        self.name = if name.is_empty() {
            format!("{prefix}{}", self.ordinal)
        } else {
            name
        };
        vars.insert("NAME".to_string(), self.name.clone());
        self.var_values = vars;
        
        let reader = ParamReader::new(node, &self.var_values);
        
        if let Some(period) = reader.opt_f64("sensor_period")? {
            if period < 0.0 {
                return Err(SimError::malformed(
                    "sensor_period",
                    format!("must be >= 0, got {period}"),
                ));
            }
            self.period = period;
        }
        
        self.rawlog_path = reader
            .opt_string("save_to_rawlog")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .map(|p| self.resolve_path(&p));
        self.rawlog = self.rawlog_path.clone().map(|path| {
            Arc::new(Mutex::new(RawlogSlot { path, writer: None }))
        });
        
        self.parse_sensor_publish(node.child("publish"))?;
        
        tracing::debug!(
            sensor = %self.name,
            owner = %self.owner_name,
            period = self.period,
            topic = %self.publish_topic,
            rawlog = ?self.rawlog_path,
            "sensor configured"
        );
        Ok(())
    }
    
    /// Parses the optional `publish` child.
    ///
    /// A missing node disables publishing; `enabled="false"` clears the topic.
    pub fn parse_sensor_publish(&mut self, node: Option<&ConfigNode>) -> Result<(), SimError> {
        let Some(node) = node else {
            self.publish_topic.clear();
            return Ok(());
        };
        
        let reader = ParamReader::new(node, &self.var_values);
        let enabled = reader.attr_bool("enabled")?.unwrap_or(true);
        let topic = reader
            .opt_string("publish_topic")
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        
        self.publish_topic = if enabled { topic } else { String::new() };
        Ok(())
    }
    
    /// Scheduling gate: decides whether the sensor fires at time `t`.
    ///
    /// Fires when `t >= last_trigger_time + period`, recording `t` and the
    /// owner pose. Missed intervals are not caught up.
    pub fn should_trigger(&mut self, t: f64, owner_pose: &Pose) -> bool {
        if t < self.last_trigger_time + self.period {
            return false;
        }
        self.last_trigger_time = t;
        self.last_trigger_pose = *owner_pose;
        true
    }
    
    /// Queues sink work for a new observation on this sensor's lane.
    ///
    /// Returns `false` (and does nothing) for `None`, or if the pool
    /// dropped the job.
    pub fn report_new_observation(
        &self,
        obs: Option<ObservationPtr>,
        ctx: &SimulationContext,
        pool: &DispatchPool,
    ) -> bool {
        let Some(obs) = obs else {
            return false;
        };
        
        let ctx = ctx.clone();
        let sensor = self.name.clone();
        let owner = self.owner_name.clone();
        let topic = self.publish_topic.clone();
        let rawlog = self.rawlog.clone();
        let health = Arc::clone(&self.health);
        
        pool.submit(
            self.id.0,
            Box::new(move || {
                ctx.services.notify(&owner, &obs);
                
                let transport = if topic.is_empty() {
                    None
                } else {
                    ctx.services.transport()
                };
                if transport.is_none() && rawlog.is_none() {
                    return;
                }
                
                let envelope = match obs.to_envelope(&owner) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        if transport.is_some() {
                            health.record_failure(SinkKind::Publish, &sensor, &e);
                        }
                        if rawlog.is_some() {
                            health.record_failure(SinkKind::Rawlog, &sensor, &e);
                        }
                        return;
                    }
                };
                
                if let Some(transport) = transport {
                    match transport.publish(&topic, &envelope) {
                        Ok(()) => health.record_ok(SinkKind::Publish),
                        Err(e) => health.record_failure(SinkKind::Publish, &sensor, &SimError::from(e)),
                    }
                }
                
                if let Some(slot) = rawlog {
                    let result = slot
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .append(&envelope);
                    match result {
                        Ok(()) => health.record_ok(SinkKind::Rawlog),
                        Err(e) => health.record_failure(SinkKind::Rawlog, &sensor, &e),
                    }
                }
            }),
        )
    }
    
    fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
    
    pub fn id(&self) -> SensorId {
        self.id
    }
    
    pub fn name(&self) -> &str {
        &self.name
    }
    
    /// Renames the sensor and refreshes `NAME`.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.var_values.insert("NAME".to_string(), self.name.clone());
    }
    
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }
    
    pub fn period(&self) -> f64 {
        self.period
    }
    
    pub fn last_trigger_time(&self) -> f64 {
        self.last_trigger_time
    }
    
    pub fn last_trigger_pose(&self) -> &Pose {
        &self.last_trigger_pose
    }
    
    /// Topic observations are published on; empty when disabled.
    pub fn publish_topic(&self) -> &str {
        &self.publish_topic
    }
    
    pub fn rawlog_path(&self) -> Option<&Path> {
        self.rawlog_path.as_deref()
    }
    
    /// `{NAME, PARENT_NAME}` substitution map.
    pub fn var_values(&self) -> &VarMap {
        &self.var_values
    }
    
    pub fn sink_health(&self) -> &Arc<SinkHealth> {
        &self.health
    }
}
