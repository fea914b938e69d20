//! Physics engine seam.
//!
//! The world owns exactly one [`PhysicsEngine`] behind its lock and only
//! ever talks to it through this trait: add/remove bodies, read poses,
//! advance by one fixed timestep. [`KinematicEngine`] is the built-in
//! implementation (constant body-frame twist, no contacts).

use nalgebra::{Isometry2, Vector2};
use std::collections::BTreeMap;

/// Planar pose (x, y, yaw) of a body in the world frame.
pub type Pose = Isometry2<f64>;

/// Handle to a body owned by a physics engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Body-frame velocity: forward, lateral (m/s) and yaw rate (rad/s).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Twist {
    pub vx: f64,
    pub vy: f64,
    pub omega: f64,
}

impl Twist {
    /// Creates a twist.
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }
}

/// Opaque physics world handle.
///
/// Every call happens with the world lock held, on whichever thread holds it.
pub trait PhysicsEngine: Send {
    /// Adds a body and returns its handle.
    fn add_body(&mut self, pose: Pose, twist: Twist) -> BodyId;
    
    /// Removes a body. Returns false if the handle was unknown.
    fn remove_body(&mut self, id: BodyId) -> bool;
    
    /// Returns the current pose of a body.
    fn body_pose(&self, id: BodyId) -> Option<Pose>;
    
    /// Replaces the twist of a body. Returns false if the handle was unknown.
    fn set_body_twist(&mut self, id: BodyId, twist: Twist) -> bool;
    
    /// Integrates all bodies over `dt` seconds.
    fn step(&mut self, dt: f64);
    
    /// Removes every body.
    fn clear(&mut self);
    
    /// Number of live bodies.
    fn body_count(&self) -> usize;
}

#[derive(Debug, Clone)]
struct KinematicBody {
    pose: Pose,
    twist: Twist,
}

/// Constant-twist integrator.
///
/// Bodies keep the twist they were created with (or were last given) and
/// are integrated with a simple Euler step in their own frame.
#[derive(Debug, Default)]
pub struct KinematicEngine {
    bodies: BTreeMap<BodyId, KinematicBody>,
    next_id: u64,
}

impl KinematicEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhysicsEngine for KinematicEngine {
    fn add_body(&mut self, pose: Pose, twist: Twist) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(id, KinematicBody { pose, twist });
        id
    }
    
    fn remove_body(&mut self, id: BodyId) -> bool {
        self.bodies.remove(&id).is_some()
    }
    
    fn body_pose(&self, id: BodyId) -> Option<Pose> {
        self.bodies.get(&id).map(|b| b.pose)
    }
    
    fn set_body_twist(&mut self, id: BodyId, twist: Twist) -> bool {
        match self.bodies.get_mut(&id) {
            Some(body) => {
                body.twist = twist;
                true
            }
            None => false,
        }
    }
    
    fn step(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            let local = Vector2::new(body.twist.vx, body.twist.vy) * dt;
            let world_delta = body.pose.rotation * local;
            let yaw = body.pose.rotation.angle() + body.twist.omega * dt;
            body.pose = Pose::new(body.pose.translation.vector + world_delta, yaw);
        }
    }
    
    fn clear(&mut self) {
        self.bodies.clear();
    }
    
    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    #[test]
    fn test_kinematic_straight_line() {
        let mut engine = KinematicEngine::new();
        let id = engine.add_body(Pose::new(Vector2::new(0.0, 0.0), 0.0), Twist::new(2.0, 0.0, 0.0));
        
        engine.step(0.5);
        engine.step(0.5);
        
        let pose = engine.body_pose(id).unwrap();
        assert_relative_eq!(pose.translation.vector.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(pose.translation.vector.y, 0.0, epsilon = 1e-12);
    }
    
    #[test]
    fn test_kinematic_body_frame() {
        let mut engine = KinematicEngine::new();
        // Facing +y, driving forward
        let id = engine.add_body(
            Pose::new(Vector2::zeros(), std::f64::consts::FRAC_PI_2),
            Twist::new(1.0, 0.0, 0.0),
        );
        
        engine.step(1.0);
        
        let pose = engine.body_pose(id).unwrap();
        assert_relative_eq!(pose.translation.vector.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pose.translation.vector.y, 1.0, epsilon = 1e-12);
    }
    
    #[test]
    fn test_kinematic_remove_and_clear() {
        let mut engine = KinematicEngine::new();
        let a = engine.add_body(Pose::identity(), Twist::default());
        let b = engine.add_body(Pose::identity(), Twist::default());
        assert_ne!(a, b);
        
        assert!(engine.remove_body(a));
        assert!(!engine.remove_body(a));
        assert!(!engine.set_body_twist(a, Twist::new(1.0, 0.0, 0.0)));
        assert_eq!(engine.body_count(), 1);
        
        engine.clear();
        assert!(engine.body_pose(b).is_none());
    }
}
