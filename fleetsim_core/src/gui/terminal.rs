//! Terminal GUI backend.
//!
//! Renders the scene with Ratatui on the alternate screen. Enable with the
//! `dashboard` feature flag. `q` or `Esc` closes the window; other
//! character keys are forwarded to the simulation as [`KeyEvent`]s.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame, Terminal,
};

use super::{GuiBackend, GuiOptions, KeyEvent, SceneSnapshot};
use crate::error::SimError;

fn gui_err(e: io::Error) -> SimError {
    SimError::Gui(e.to_string())
}

/// Full-screen terminal view of the world.
pub struct TerminalGui {
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    open: bool,
    frame_count: usize,
}

impl TerminalGui {
    /// Switches the terminal to raw mode on the alternate screen.
    pub fn new(_options: &GuiOptions) -> Result<Self, SimError> {
        enable_raw_mode().map_err(gui_err)?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).map_err(gui_err)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout)).map_err(gui_err)?;
        
        Ok(Self {
            terminal: Some(terminal),
            open: true,
            frame_count: 0,
        })
    }
    
    fn poll_key(&mut self) -> Result<Option<KeyEvent>, SimError> {
        if !event::poll(Duration::ZERO).map_err(gui_err)? {
            return Ok(None);
        }
        let Event::Key(key) = event::read().map_err(gui_err)? else {
            return Ok(None);
        };
        if key.kind != KeyEventKind::Press {
            return Ok(None);
        }
        
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.open = false;
                Ok(None)
            }
            KeyCode::Char(c) => Ok(Some(KeyEvent {
                keycode: c as u32,
                shift: key.modifiers.contains(KeyModifiers::SHIFT),
                ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
                alt: key.modifiers.contains(KeyModifiers::ALT),
            })),
            _ => Ok(None),
        }
    }
    
    fn restore(&mut self) -> Result<(), SimError> {
        let Some(mut terminal) = self.terminal.take() else {
            return Ok(());
        };
        disable_raw_mode().map_err(gui_err)?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen).map_err(gui_err)?;
        terminal.show_cursor().map_err(gui_err)?;
        Ok(())
    }
}

impl GuiBackend for TerminalGui {
    fn render(&mut self, scene: &SceneSnapshot) -> Result<Option<KeyEvent>, SimError> {
        self.frame_count += 1;
        let frame_count = self.frame_count;
        if let Some(terminal) = self.terminal.as_mut() {
            terminal
                .draw(|f| ui(f, scene, frame_count))
                .map_err(gui_err)?;
        }
        self.poll_key()
    }
    
    fn is_open(&self) -> bool {
        self.open
    }
    
    fn shutdown(&mut self) -> Result<(), SimError> {
        self.open = false;
        self.restore()
    }
}

impl Drop for TerminalGui {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

fn ui(f: &mut Frame, scene: &SceneSnapshot, frame_count: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Vehicles
            Constraint::Length(6), // Messages
            Constraint::Length(1), // Footer
        ])
        .split(f.area());
    
    let header = Paragraph::new(Line::from(vec![
        Span::styled("FleetSim", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("  |  "),
        Span::styled(format!("t={:.3}s", scene.simul_time), Style::default().fg(Color::Cyan)),
        Span::raw("  |  "),
        Span::raw(format!(
            "{} vehicles, {} blocks, {} elements",
            scene.vehicles.len(),
            scene.blocks.len(),
            scene.world_elements
        )),
        Span::raw("  |  "),
        Span::raw(format!("Frame: {frame_count}")),
    ]))
    .block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(header, chunks[0]);
    
    let header_cells = ["Vehicle", "x", "y", "yaw", "Sensors"]
        .iter()
        .map(|h| Span::styled(*h, Style::default().add_modifier(Modifier::BOLD)));
    let table_header = Row::new(header_cells).height(1);
    
    let rows: Vec<Row> = scene
        .vehicles
        .iter()
        .map(|v| {
            let style = if v.name == scene.follow_vehicle {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            };
            Row::new(vec![
                Span::styled(v.name.clone(), style),
                Span::raw(format!("{:.2}", v.pose[0])),
                Span::raw(format!("{:.2}", v.pose[1])),
                Span::raw(format!("{:.1}°", v.pose[2].to_degrees())),
                Span::raw(v.sensor_count.to_string()),
            ])
        })
        .collect();
    
    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(table_header)
    .block(Block::default().title("Vehicles").borders(Borders::ALL));
    f.render_widget(table, chunks[1]);
    
    let messages = Paragraph::new(scene.msg_lines.as_str())
        .block(Block::default().title("Messages").borders(Borders::ALL));
    f.render_widget(messages, chunks[2]);
    
    let footer = Paragraph::new("Press 'q' to quit").style(Style::default().fg(Color::DarkGray));
    f.render_widget(footer, chunks[3]);
}
