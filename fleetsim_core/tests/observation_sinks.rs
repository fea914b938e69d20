//! End-to-end observation dispatch: hook, pub/sub and rawlog sinks driven
//! by `World::run_simulation`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use fleetsim_core::{
    Observation, ObservationPayload, RawlogReader, World, WorldConfig,
};
use fleetsim_env::{EnvError, LocalBus, ObservationEnvelope, Transport};

const EPOCH: f64 = 1_700_000_000.0;

fn world() -> World {
    World::new(WorldConfig {
        epoch_unix: Some(EPOCH),
        ..Default::default()
    })
    .unwrap()
}

fn laser_world(extra: &str) -> String {
    format!(
        r#"<world>
            <vehicle name="r1">
                <init_vel>1 0 0</init_vel>
                <sensor class="laser">
                    <nrays>9</nrays>
                    {extra}
                </sensor>
            </vehicle>
            <block name="wall"><init_pose>6 0 0</init_pose><radius>1</radius></block>
        </world>"#
    )
}

/// Transport whose publishes always fail.
#[derive(Default)]
struct BrokenTransport {
    attempts: Mutex<u64>,
}

impl Transport for BrokenTransport {
    fn advertise(&self, _topic: &str) -> Result<(), EnvError> {
        Ok(())
    }
    
    fn publish(&self, _topic: &str, _envelope: &ObservationEnvelope) -> Result<(), EnvError> {
        *self.attempts.lock().unwrap() += 1;
        Err(EnvError::transport("link down"))
    }
    
    fn is_advertised(&self, _topic: &str) -> bool {
        true
    }
}

#[test]
fn test_rawlog_preserves_trigger_order() {
    let dir = tempfile::tempdir().unwrap();
    let w = world();
    w.load_from_xml(&laser_world("<save_to_rawlog>${NAME}.rawlog</save_to_rawlog>"), dir.path())
        .unwrap();
    
    w.run_simulation(0.25);
    // Releasing the sensors closes the log.
    w.clear_all();
    
    let records: Vec<ObservationEnvelope> = RawlogReader::open(dir.path().join("laser1.rawlog"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    
    assert_eq!(records.len(), 50);
    for (k, env) in records.iter().enumerate() {
        let expected = EPOCH + 0.005 * (k + 1) as f64;
        assert!((env.unix_timestamp - expected).abs() < 1e-6);
        assert_eq!(env.source_object_id, "r1");
    }
    
    let first = Observation::from_envelope(&records[0]).unwrap();
    assert_eq!(first.sensor_label, "laser1");
    assert!(matches!(first.payload, ObservationPayload::RangeScan(_)));
}

#[test]
fn test_rawlog_readable_while_world_alive() {
    let dir = tempfile::tempdir().unwrap();
    let w = world();
    w.load_from_xml(&laser_world("<save_to_rawlog>live.rawlog</save_to_rawlog>"), dir.path())
        .unwrap();
    
    w.run_simulation(0.25);
    w.flush_dispatch();
    assert_eq!(w.dispatch_stats().completed, 50);
    
    let path = dir.path().join("live.rawlog");
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
    let records: Vec<ObservationEnvelope> = RawlogReader::open(&path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 50);
    
    // Logging continues into the same file.
    w.run_simulation(0.05);
    w.flush_dispatch();
    assert_eq!(RawlogReader::open(&path).unwrap().count(), 60);
}

#[test]
fn test_period_limits_log_records() {
    let dir = tempfile::tempdir().unwrap();
    let w = world();
    w.load_from_xml(
        &laser_world("<sensor_period>0.1</sensor_period><save_to_rawlog>scan.rawlog</save_to_rawlog>"),
        dir.path(),
    )
    .unwrap();
    
    // Fires at t = 0.005, then every 0.1 s: 0.105, 0.205, ...
    w.run_simulation(1.0);
    w.clear_all();
    
    let count = RawlogReader::open(dir.path().join("scan.rawlog")).unwrap().count();
    assert_eq!(count, 10);
}

#[test]
fn test_publish_on_local_bus() {
    let bus = LocalBus::shared();
    let rx = bus.subscribe("/r1/laser1");
    
    let w = world();
    w.set_transport(Some(bus.clone()));
    w.load_from_xml(
        &laser_world("<publish><publish_topic>/${PARENT_NAME}/${NAME}</publish_topic></publish>"),
        Path::new("."),
    )
    .unwrap();
    assert!(bus.is_advertised("/r1/laser1"));
    
    w.run_simulation(0.05);
    w.flush_dispatch();
    
    let received: Vec<ObservationEnvelope> = rx.try_iter().collect();
    assert_eq!(received.len(), 10);
    
    let obs = Observation::from_envelope(&received[0]).unwrap();
    let ObservationPayload::RangeScan(scan) = obs.payload else {
        panic!("expected a range scan");
    };
    assert_eq!(scan.ranges.len(), 9);
    // Center ray sees the wall 5 m ahead, minus the distance driven.
    assert!(scan.valid[4]);
    assert!((scan.ranges[4] - 5.0).abs() < 0.1);
}

#[test]
fn test_disabled_publish_advertises_nothing() {
    let bus = LocalBus::shared();
    let w = world();
    w.set_transport(Some(bus.clone()));
    w.load_from_xml(
        &laser_world(r#"<publish enabled="false"><publish_topic>scan</publish_topic></publish>"#),
        Path::new("."),
    )
    .unwrap();
    
    w.run_simulation(0.05);
    w.flush_dispatch();
    
    assert!(bus.topics().is_empty());
    assert_eq!(bus.published_count(), 0);
}

#[test]
fn test_failing_transport_does_not_starve_rawlog() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(BrokenTransport::default());
    let w = world();
    w.set_transport(Some(transport.clone()));
    w.load_from_xml(
        &laser_world(
            "<publish><publish_topic>scan</publish_topic></publish>\
             <save_to_rawlog>scan.rawlog</save_to_rawlog>",
        ),
        dir.path(),
    )
    .unwrap();
    
    w.run_simulation(0.1);
    w.flush_dispatch();
    
    {
        let guard = w.lock();
        let health = guard.vehicles().first("r1").unwrap().sensors()[0]
            .base()
            .sink_health()
            .clone();
        assert_eq!(health.publish_failures(), 20);
        assert_eq!(health.published(), 0);
        assert_eq!(health.logged(), 20);
    }
    assert_eq!(*transport.attempts.lock().unwrap(), 20);
    
    w.clear_all();
    assert_eq!(RawlogReader::open(dir.path().join("scan.rawlog")).unwrap().count(), 20);
}

#[test]
fn test_hook_sees_every_observation() {
    let w = world();
    let per_owner: Arc<Mutex<HashMap<String, usize>>> = Arc::default();
    let sink = per_owner.clone();
    w.set_observation_hook(Some(Arc::new(move |owner: &str, _obs: &Observation| {
        *sink.lock().unwrap().entry(owner.to_string()).or_default() += 1;
    })));
    
    w.load_from_xml(
        r#"<world>
            <vehicle name="a"><sensor class="laser"/><sensor class="camera"/></vehicle>
            <vehicle name="b"><sensor class="camera"/></vehicle>
        </world>"#,
        Path::new("."),
    )
    .unwrap();
    
    w.run_simulation(0.1);
    w.flush_dispatch();
    
    let counts = per_owner.lock().unwrap();
    assert_eq!(counts["a"], 40);
    assert_eq!(counts["b"], 20);
    assert_eq!(w.dispatch_stats().completed, 60);
}
