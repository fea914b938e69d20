//! Static geometry seen by range sensors.

use serde::Serialize;

/// Circular obstacle in the world frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Obstacle {
    pub name: String,
    pub center: [f64; 2],
    pub radius: f64,
}

/// Obstacles visible to sensors during one timestep.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub obstacles: Vec<Obstacle>,
}

impl Scene {
    pub fn new(obstacles: Vec<Obstacle>) -> Self {
        Self { obstacles }
    }
    
    /// Distance to the nearest obstacle along a ray, if within `max_range`.
    ///
    /// An origin inside an obstacle hits at distance zero.
    pub fn ray_cast(&self, origin: [f64; 2], angle: f64, max_range: f64) -> Option<f64> {
        let (dx, dy) = (angle.cos(), angle.sin());
        
        self.obstacles
            .iter()
            .filter_map(|o| {
                let fx = origin[0] - o.center[0];
                let fy = origin[1] - o.center[1];
                let c = fx * fx + fy * fy - o.radius * o.radius;
                if c <= 0.0 {
                    return Some(0.0);
                }
                
                let b = fx * dx + fy * dy;
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let t = -b - disc.sqrt();
                (t >= 0.0).then_some(t)
            })
            .filter(|&t| t <= max_range)
            .min_by(|a, b| a.total_cmp(b))
    }
}
