use super::{GuiBackend, KeyEvent, SceneSnapshot};
use crate::error::SimError;

/// Backend that draws nothing; counts frames.
#[derive(Debug, Default)]
pub struct HeadlessGui {
    frames: u64,
    last_time: f64,
}

impl HeadlessGui {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl GuiBackend for HeadlessGui {
    fn render(&mut self, scene: &SceneSnapshot) -> Result<Option<KeyEvent>, SimError> {
        self.frames += 1;
        if scene.simul_time < self.last_time {
            tracing::debug!(from = self.last_time, to = scene.simul_time, "simulation clock reset");
        }
        self.last_time = scene.simul_time;
        Ok(None)
    }
    
    fn is_open(&self) -> bool {
        true
    }
}
