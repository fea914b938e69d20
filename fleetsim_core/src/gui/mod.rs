//! GUI thread coordination.
//!
//! The GUI runs on its own thread and never touches the stepping thread's
//! state directly: it pulls a [`SceneSnapshot`] through a callback (which
//! briefly takes the world lock) and exchanges messages and key presses
//! through mutex-protected slots. Lifecycle flags are atomics.
//!
//! State machine: `NotStarted → Running → CloseRequested → Closed`.
//! `Closed` is terminal; a closed GUI is never restarted.

mod headless;
#[cfg(feature = "dashboard")]
mod terminal;

pub use headless::HeadlessGui;
#[cfg(feature = "dashboard")]
pub use terminal::TerminalGui;

use crate::error::SimError;
use crate::scene::Obstacle;
use crate::visual::SensorVisual;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `close` waits for the GUI thread before detaching it.
pub const GUI_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A key press captured by the GUI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    /// Unicode scalar of the key, or 0 for non-character keys
    pub keycode: u32,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl KeyEvent {
    pub fn from_char(c: char) -> Self {
        Self {
            keycode: c as u32,
            ..Self::default()
        }
    }
    
    pub fn as_char(&self) -> Option<char> {
        char::from_u32(self.keycode).filter(|c| *c != '\0')
    }
}

/// Data exchanged with the GUI on every `update_gui` call.
#[derive(Debug, Clone, Default)]
pub struct GuiUpdateParams {
    /// Out: last key pressed since the previous call
    pub key_event: Option<KeyEvent>,
    
    /// In: text shown in the GUI message area
    pub msg_lines: String,
}

/// GUI window options from the world description.
#[derive(Debug, Clone, PartialEq)]
pub struct GuiOptions {
    pub win_w: u32,
    pub win_h: u32,
    pub refresh_fps: f64,
    /// Vehicle the view follows; empty for a fixed view
    pub follow_vehicle: String,
}

impl Default for GuiOptions {
    fn default() -> Self {
        Self {
            win_w: 800,
            win_h: 600,
            refresh_fps: 20.0,
            follow_vehicle: String::new(),
        }
    }
}

/// Lifecycle of the GUI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GuiState {
    NotStarted = 0,
    Running = 1,
    CloseRequested = 2,
    Closed = 3,
}

impl GuiState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::CloseRequested,
            _ => Self::Closed,
        }
    }
}

/// Vehicle as drawn by the GUI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSnapshot {
    pub name: String,
    /// [x, y, yaw]
    pub pose: [f64; 3],
    pub sensor_count: usize,
}

/// Everything the GUI needs to draw one frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneSnapshot {
    pub simul_time: f64,
    pub vehicles: Vec<VehicleSnapshot>,
    pub blocks: Vec<Obstacle>,
    pub world_elements: usize,
    pub visuals: Vec<SensorVisual>,
    pub msg_lines: String,
    pub follow_vehicle: String,
}

/// A rendering surface driven by the GUI thread.
pub trait GuiBackend {
    /// Draws one frame and returns a key pressed since the last frame.
    fn render(&mut self, scene: &SceneSnapshot) -> Result<Option<KeyEvent>, SimError>;
    
    /// False once the user closed the window.
    fn is_open(&self) -> bool;
    
    /// Releases the surface.
    fn shutdown(&mut self) -> Result<(), SimError> {
        Ok(())
    }
}

/// Creates the backend on the GUI thread.
pub type GuiBackendFactory =
    Arc<dyn Fn(&GuiOptions) -> Result<Box<dyn GuiBackend>, SimError> + Send + Sync>;

/// Produces the current scene; called from the GUI thread.
pub type SnapshotFn = Arc<dyn Fn() -> SceneSnapshot + Send + Sync>;

/// Terminal backend when built with `dashboard`, headless otherwise.
pub fn default_gui_backend() -> GuiBackendFactory {
    #[cfg(feature = "dashboard")]
    {
        Arc::new(|options: &GuiOptions| {
            Ok(Box::new(TerminalGui::new(options)?) as Box<dyn GuiBackend>)
        })
    }
    #[cfg(not(feature = "dashboard"))]
    {
        Arc::new(|_: &GuiOptions| Ok(Box::new(HeadlessGui::new()) as Box<dyn GuiBackend>))
    }
}

#[derive(Default)]
struct GuiShared {
    state: AtomicU8,
    key_valid: AtomicBool,
    last_key: Mutex<Option<KeyEvent>>,
    msg_lines: Mutex<String>,
}

impl GuiShared {
    fn state(&self) -> GuiState {
        GuiState::from_u8(self.state.load(Ordering::Acquire))
    }
    
    fn set_state(&self, state: GuiState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Owns the GUI thread and the data shared with it.
pub struct GuiCoordinator {
    shared: Arc<GuiShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
    close_tx: Mutex<Option<Sender<()>>>,
    join_timeout: Duration,
}

impl Default for GuiCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl GuiCoordinator {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(GuiShared::default()),
            thread: Mutex::new(None),
            close_tx: Mutex::new(None),
            join_timeout: GUI_JOIN_TIMEOUT,
        }
    }
    
    /// Overrides the bounded wait used by [`GuiCoordinator::close`].
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }
    
    pub fn state(&self) -> GuiState {
        self.shared.state()
    }
    
    pub fn is_open(&self) -> bool {
        self.state() == GuiState::Running
    }
    
    /// Starts the GUI thread if it never ran. Returns whether it was started.
    pub fn start(
        &self,
        options: GuiOptions,
        factory: GuiBackendFactory,
        snapshot: SnapshotFn,
    ) -> Result<bool, SimError> {
        if self
            .shared
            .state
            .compare_exchange(
                GuiState::NotStarted as u8,
                GuiState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(false);
        }
        
        let (close_tx, close_rx) = channel::bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("fleetsim-gui".into())
            .spawn(move || {
                let mut backend = match factory(&options) {
                    Ok(backend) => backend,
                    Err(e) => {
                        tracing::error!("failed to create GUI backend: {e}");
                        shared.set_state(GuiState::Closed);
                        return;
                    }
                };
                tracing::info!(fps = options.refresh_fps, "GUI thread running");
                
                let period = Duration::from_secs_f64(1.0 / options.refresh_fps.max(1.0));
                while shared.state() == GuiState::Running {
                    let mut scene = snapshot();
                    scene.follow_vehicle = options.follow_vehicle.clone();
                    scene.msg_lines = shared
                        .msg_lines
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    
                    match backend.render(&scene) {
                        Ok(Some(key)) => {
                            *shared.last_key.lock().unwrap_or_else(PoisonError::into_inner) = Some(key);
                            shared.key_valid.store(true, Ordering::Release);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!("GUI render failed: {e}");
                            break;
                        }
                    }
                    if !backend.is_open() {
                        tracing::info!("GUI window closed by user");
                        break;
                    }
                    
                    match close_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                
                if let Err(e) = backend.shutdown() {
                    tracing::warn!("GUI backend shutdown failed: {e}");
                }
                shared.set_state(GuiState::Closed);
            });
        
        match spawned {
            Ok(handle) => {
                *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                *self.close_tx.lock().unwrap_or_else(PoisonError::into_inner) = Some(close_tx);
                Ok(true)
            }
            Err(e) => {
                self.shared.set_state(GuiState::Closed);
                Err(SimError::Gui(format!("cannot spawn GUI thread: {e}")))
            }
        }
    }
    
    /// Publishes message lines and hands back the last key press.
    pub fn exchange(&self, params: &mut GuiUpdateParams) {
        *self
            .shared
            .msg_lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = params.msg_lines.clone();
        
        params.key_event = if self.shared.key_valid.swap(false, Ordering::AcqRel) {
            self.shared
                .last_key
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
        } else {
            None
        };
    }
    
    /// Requests the GUI thread to stop and waits a bounded time for it.
    ///
    /// Idempotent. A GUI that never started stays `NotStarted`.
    pub fn close(&self) {
        let handle = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            return;
        };
        
        if self.state() == GuiState::Running {
            self.shared.set_state(GuiState::CloseRequested);
        }
        if let Some(tx) = self.close_tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.try_send(());
        }
        
        let deadline = Instant::now() + self.join_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        
        if handle.is_finished() {
            if handle.join().is_err() {
                tracing::warn!("GUI thread panicked");
            }
        } else {
            tracing::warn!(timeout = ?self.join_timeout, "GUI thread did not stop in time, detaching");
        }
        self.shared.set_state(GuiState::Closed);
    }
}

impl Drop for GuiCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    struct ScriptedGui {
        keys: Vec<KeyEvent>,
        frames: Arc<AtomicU8>,
    }
    
    impl GuiBackend for ScriptedGui {
        fn render(&mut self, _scene: &SceneSnapshot) -> Result<Option<KeyEvent>, SimError> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(self.keys.pop())
        }
        
        fn is_open(&self) -> bool {
            true
        }
    }
    
    fn snapshot() -> SnapshotFn {
        Arc::new(SceneSnapshot::default)
    }
    
    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
    
    #[test]
    fn test_close_is_idempotent_and_terminal() {
        let gui = GuiCoordinator::new();
        gui.close();
        assert_eq!(gui.state(), GuiState::NotStarted);
        
        let factory: GuiBackendFactory = Arc::new(|_: &GuiOptions| Ok(Box::new(HeadlessGui::new()) as Box<dyn GuiBackend>));
        assert!(gui.start(GuiOptions::default(), factory.clone(), snapshot()).unwrap());
        assert!(gui.is_open());
        
        gui.close();
        gui.close();
        assert!(!gui.is_open());
        assert_eq!(gui.state(), GuiState::Closed);
        assert!(!gui.start(GuiOptions::default(), factory, snapshot()).unwrap());
    }
    
    #[test]
    fn test_key_event_handed_back_once() {
        let gui = GuiCoordinator::new();
        let frames = Arc::new(AtomicU8::new(0));
        let counter = frames.clone();
        let factory: GuiBackendFactory = Arc::new(move |_: &GuiOptions| {
            Ok(Box::new(ScriptedGui {
                keys: vec![KeyEvent::from_char('w')],
                frames: counter.clone(),
            }) as Box<dyn GuiBackend>)
        });
        gui.start(GuiOptions::default(), factory, snapshot()).unwrap();
        
        let mut params = GuiUpdateParams {
            msg_lines: "hello".into(),
            ..Default::default()
        };
        assert!(wait_for(|| {
            gui.exchange(&mut params);
            params.key_event.is_some()
        }));
        assert_eq!(params.key_event.and_then(|k| k.as_char()), Some('w'));
        
        gui.exchange(&mut params);
        assert_eq!(params.key_event, None);
        assert!(frames.load(Ordering::SeqCst) >= 1);
        gui.close();
    }
    
    #[test]
    fn test_backend_failure_closes() {
        let gui = GuiCoordinator::new();
        let factory: GuiBackendFactory = Arc::new(|_: &GuiOptions| {
            Err::<Box<dyn GuiBackend>, _>(SimError::Gui("no display".into()))
        });
        gui.start(GuiOptions::default(), factory, snapshot()).unwrap();
        
        assert!(wait_for(|| gui.state() == GuiState::Closed));
        assert!(!gui.is_open());
        gui.close();
    }
}
