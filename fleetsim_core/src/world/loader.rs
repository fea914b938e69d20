//! World description parsing.
//!
//! The whole document is turned into a [`WorldDescription`] before the
//! world is touched, so a malformed file never leaves a half-loaded world.

use crate::config::ConfigNode;
use crate::entities::{Block, Vehicle, WorldElement};
use crate::error::SimError;
use crate::gui::GuiOptions;
use crate::params::{parse_f64, parse_usize, ParamReader, VarMap};
use std::path::Path;

/// Parsed, not yet applied, world.
#[derive(Debug, Default)]
pub struct WorldDescription {
    pub simul_timestep: Option<f64>,
    pub gravity: Option<f64>,
    pub gui: GuiOptions,
    pub vehicles: Vec<Vehicle>,
    pub blocks: Vec<Block>,
    pub elements: Vec<WorldElement>,
}

/// Parses a `<world>` document.
pub fn parse_world(text: &str, base_path: &Path) -> Result<WorldDescription, SimError> {
    let root = ConfigNode::parse_xml(text)?;
    if root.tag() != "world" {
        return Err(SimError::malformed(
            "world",
            format!("root element must be <world>, found <{}>", root.tag()),
        ));
    }
    
    let vars = VarMap::new();
    let reader = ParamReader::new(&root, &vars);
    let mut desc = WorldDescription {
        simul_timestep: reader.opt_f64("simul_timestep")?,
        gravity: reader.opt_f64("gravity")?,
        ..Default::default()
    };
    if let Some(ts) = desc.simul_timestep {
        if ts <= 0.0 {
            return Err(SimError::malformed("simul_timestep", format!("must be > 0, got {ts}")));
        }
    }
    if let Some(gui) = root.child("gui") {
        desc.gui = parse_gui_options(gui)?;
    }
    
    for child in root.children() {
        match child.tag() {
            "vehicle" => desc.vehicles.push(Vehicle::from_config(child, base_path)?),
            "block" => desc.blocks.push(Block::from_config(child)?),
            "element" => desc.elements.push(WorldElement::from_config(child)?),
            "simul_timestep" | "gravity" | "gui" => {}
            other => tracing::debug!(tag = other, "ignoring unknown world element"),
        }
    }
    
    tracing::debug!(
        vehicles = desc.vehicles.len(),
        blocks = desc.blocks.len(),
        elements = desc.elements.len(),
        "world description parsed"
    );
    Ok(desc)
}

/// `<gui>` options may be attributes or children.
fn parse_gui_options(node: &ConfigNode) -> Result<GuiOptions, SimError> {
    let value = |key: &str| -> Option<String> {
        node.attr(key)
            .map(str::to_string)
            .or_else(|| node.child(key).map(|c| c.text().to_string()))
    };
    let dimension = |key: &str| -> Result<Option<u32>, SimError> {
        value(key)
            .map(|raw| {
                let v = parse_usize(key, &raw)?;
                u32::try_from(v).map_err(|_| SimError::malformed(key, format!("{v} is too large")))
            })
            .transpose()
    };
    
    let mut options = GuiOptions::default();
    if let Some(w) = dimension("win_w")? {
        options.win_w = w;
    }
    if let Some(h) = dimension("win_h")? {
        options.win_h = h;
    }
    if let Some(raw) = value("refresh_fps") {
        let fps = parse_f64("refresh_fps", &raw)?;
        if fps <= 0.0 {
            return Err(SimError::malformed("refresh_fps", format!("must be > 0, got {fps}")));
        }
        options.refresh_fps = fps;
    }
    if let Some(follow) = value("follow_vehicle") {
        options.follow_vehicle = follow.trim().to_string();
    }
    Ok(options)
}
