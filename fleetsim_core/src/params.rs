//! Typed parameter parsing with `${VAR}` substitution.
//!
//! Scalar parameters are written as child elements (`<sensor_period>0.1</sensor_period>`),
//! flags as attributes (`<publish enabled="false">`). Text values may refer
//! to variables such as `${NAME}` or `${PARENT_NAME}`; unknown variables are
//! left in place verbatim.

use crate::config::ConfigNode;
use crate::error::SimError;
use crate::physics::{Pose, Twist};
use std::collections::BTreeMap;

/// Variable name → value mapping used during substitution.
pub type VarMap = BTreeMap<String, String>;

/// Replaces every `${VAR}` occurrence whose name is present in `vars`.
pub fn substitute_vars(input: &str, vars: &VarMap) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 3 + end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses a floating-point value.
pub fn parse_f64(field: &str, raw: &str) -> Result<f64, SimError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| SimError::malformed(field, format!("expected a number, got '{raw}'")))?;
    if !value.is_finite() {
        return Err(SimError::malformed(field, format!("value '{raw}' is not finite")));
    }
    Ok(value)
}

/// Parses a non-negative integer.
pub fn parse_usize(field: &str, raw: &str) -> Result<usize, SimError> {
    raw.trim()
        .parse()
        .map_err(|_| SimError::malformed(field, format!("expected a non-negative integer, got '{raw}'")))
}

/// Parses a boolean token (`true/false`, `1/0`, `yes/no`, `on/off`).
pub fn parse_bool(field: &str, raw: &str) -> Result<bool, SimError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SimError::malformed(field, format!("expected a boolean, got '{raw}'"))),
    }
}

fn parse_triplet(field: &str, raw: &str) -> Result<[f64; 3], SimError> {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(SimError::malformed(
            field,
            format!("expected three numbers, got '{raw}'"),
        ));
    }
    Ok([
        parse_f64(field, parts[0])?,
        parse_f64(field, parts[1])?,
        parse_f64(field, parts[2])?,
    ])
}

/// Parses a planar pose written as `x y yaw_deg`.
pub fn parse_pose(field: &str, raw: &str) -> Result<Pose, SimError> {
    let [x, y, yaw_deg] = parse_triplet(field, raw)?;
    Ok(Pose::new(nalgebra::Vector2::new(x, y), yaw_deg.to_radians()))
}

/// Parses a body-frame twist written as `vx vy omega_deg`.
pub fn parse_twist(field: &str, raw: &str) -> Result<Twist, SimError> {
    let [vx, vy, omega_deg] = parse_triplet(field, raw)?;
    Ok(Twist::new(vx, vy, omega_deg.to_radians()))
}

/// Typed, substitution-aware view over one configuration node.
pub struct ParamReader<'a> {
    node: &'a ConfigNode,
    vars: &'a VarMap,
}

impl<'a> ParamReader<'a> {
    /// Creates a reader over `node` resolving variables from `vars`.
    pub fn new(node: &'a ConfigNode, vars: &'a VarMap) -> Self {
        Self { node, vars }
    }
    
    /// Returns the substituted text of child `key`, if present.
    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.node
            .child(key)
            .map(|c| substitute_vars(c.text(), self.vars))
    }
    
    /// Returns the substituted value of attribute `key`, if present.
    pub fn attr_string(&self, key: &str) -> Option<String> {
        self.node.attr(key).map(|v| substitute_vars(v, self.vars))
    }
    
    /// Parses child `key` as a number.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, SimError> {
        self.opt_string(key).map(|raw| parse_f64(key, &raw)).transpose()
    }
    
    /// Parses child `key` as a non-negative integer.
    pub fn opt_usize(&self, key: &str) -> Result<Option<usize>, SimError> {
        self.opt_string(key).map(|raw| parse_usize(key, &raw)).transpose()
    }
    
    /// Parses child `key` as a `x y yaw_deg` pose.
    pub fn opt_pose(&self, key: &str) -> Result<Option<Pose>, SimError> {
        self.opt_string(key).map(|raw| parse_pose(key, &raw)).transpose()
    }
    
    /// Parses child `key` as a `vx vy omega_deg` twist.
    pub fn opt_twist(&self, key: &str) -> Result<Option<Twist>, SimError> {
        self.opt_string(key).map(|raw| parse_twist(key, &raw)).transpose()
    }
    
    /// Parses attribute `key` as a boolean.
    pub fn attr_bool(&self, key: &str) -> Result<Option<bool>, SimError> {
        self.attr_string(key).map(|raw| parse_bool(key, &raw)).transpose()
    }
    
    /// Parses attribute `key` as a number.
    pub fn attr_f64(&self, key: &str) -> Result<Option<f64>, SimError> {
        self.attr_string(key).map(|raw| parse_f64(key, &raw)).transpose()
    }
}
