// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalization tolerances and switches.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```
//! use strucnorm_core::config::{NormalizeConfig, Shift};
//!
//! let config = NormalizeConfig::from_json_str(
//!     r#"{ "min_length": 0.1, "transform": { "dx": "auto", "dy": -2.5, "alpha_deg": 0.0 } }"#,
//! ).unwrap();
//! assert_eq!(config.min_length, 0.1);
//! assert_eq!(config.transform.unwrap().dx, Shift::Auto);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{require_non_negative, require_positive, Error, Result};
use crate::node::DEFAULT_NODE_TOLERANCE;

/// Translation along one axis: a fixed offset, or "move the minimum to 0".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShiftRepr", into = "ShiftRepr")]
pub enum Shift {
    Auto,
    Value(f64),
}

impl Default for Shift {
    fn default() -> Self {
        Shift::Value(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ShiftRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<ShiftRepr> for Shift {
    type Error = String;

    fn try_from(repr: ShiftRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ShiftRepr::Number(v) => Ok(Shift::Value(v)),
            ShiftRepr::Text(s) if s.eq_ignore_ascii_case("auto") => Ok(Shift::Auto),
            ShiftRepr::Text(s) => Err(format!("expected a number or \"auto\", got {s:?}")),
        }
    }
}

impl From<Shift> for ShiftRepr {
    fn from(shift: Shift) -> Self {
        match shift {
            Shift::Auto => ShiftRepr::Text("auto".into()),
            Shift::Value(v) => ShiftRepr::Number(v),
        }
    }
}

/// Rigid plan transform: translate by `(dx, dy)`, then rotate by `alpha_deg`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub dx: Shift,
    pub dy: Shift,
    pub alpha_deg: f64,
}

/// Grid inference and node snapping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Angular radius (degrees) for clustering element orientations.
    pub eps_deg: f64,
    /// Radius (metres) for clustering line offsets.
    pub eps_dist: f64,
    /// Decimal places grid offsets are rounded to.
    pub round_decimal: u32,
    /// Preferred orientations detected angles snap to.
    pub canonical_angles: Vec<f64>,
    /// Maximum angular distance for snapping onto a canonical angle.
    pub snap_threshold: f64,
    /// Maximum residual for a node to claim a grid line.
    pub max_distance: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            eps_deg: 2.0,
            eps_dist: 0.05,
            round_decimal: 2,
            canonical_angles: Vec::new(),
            snap_threshold: 2.5,
            max_distance: 0.1,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        require_positive("eps_deg", self.eps_deg)?;
        require_positive("eps_dist", self.eps_dist)?;
        require_non_negative("snap_threshold", self.snap_threshold)?;
        require_non_negative("max_distance", self.max_distance)?;
        if self.round_decimal > 12 {
            return Err(Error::invalid_parameter(
                "round_decimal",
                format!("at most 12 decimal places, got {}", self.round_decimal),
            ));
        }
        if let Some(bad) = self.canonical_angles.iter().find(|a| !a.is_finite()) {
            return Err(Error::invalid_parameter(
                "canonical_angles",
                format!("non-finite angle {bad}"),
            ));
        }
        Ok(())
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Merge tolerance of the node store (metres).
    pub node_tolerance: f64,
    /// Optional coarser tolerance applied before optimization.
    pub pre_snap_tolerance: Option<f64>,
    /// Frames and wall panels shorter than this are removed (metres).
    pub min_length: f64,
    /// Angular radius (degrees) for de-noising element orientations.
    pub angle_eps_deg: f64,
    /// Run orientation clustering and snapping during optimization.
    pub fix_angles: bool,
    pub transform: Option<TransformConfig>,
    pub grid: GridConfig,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            node_tolerance: DEFAULT_NODE_TOLERANCE,
            pre_snap_tolerance: None,
            min_length: 0.05,
            angle_eps_deg: 2.0,
            fix_angles: true,
            transform: None,
            grid: GridConfig::default(),
        }
    }
}

impl NormalizeConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: NormalizeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fails fast on out-of-range tolerances.
    pub fn validate(&self) -> Result<()> {
        require_positive("node_tolerance", self.node_tolerance)?;
        if let Some(t) = self.pre_snap_tolerance {
            require_positive("pre_snap_tolerance", t)?;
        }
        require_non_negative("min_length", self.min_length)?;
        require_positive("angle_eps_deg", self.angle_eps_deg)?;
        if let Some(transform) = &self.transform {
            if !transform.alpha_deg.is_finite() {
                return Err(Error::invalid_parameter("alpha_deg", "must be finite"));
            }
            for shift in [transform.dx, transform.dy] {
                if let Shift::Value(v) = shift {
                    if !v.is_finite() {
                        return Err(Error::invalid_parameter("dx/dy", "must be finite"));
                    }
                }
            }
        }
        self.grid.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NormalizeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.node_tolerance, 0.005);
        assert_eq!(config.grid.round_decimal, 2);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = NormalizeConfig::from_json_str(
            r#"{ "grid": { "canonical_angles": [0, 90], "eps_dist": 0.1 } }"#,
        )
        .unwrap();
        assert_eq!(config.grid.canonical_angles, vec![0.0, 90.0]);
        assert_eq!(config.grid.eps_dist, 0.1);
        assert_eq!(config.grid.eps_deg, 2.0);
        assert!(config.transform.is_none());
    }

    #[test]
    fn shift_accepts_auto_or_number() {
        let t: TransformConfig =
            serde_json::from_str(r#"{ "dx": "Auto", "dy": 3.5, "alpha_deg": 10 }"#).unwrap();
        assert_eq!(t.dx, Shift::Auto);
        assert_eq!(t.dy, Shift::Value(3.5));
        assert!(serde_json::from_str::<TransformConfig>(r#"{ "dx": "left" }"#).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = NormalizeConfig::default();
        config.transform = Some(TransformConfig {
            dx: Shift::Auto,
            dy: Shift::Value(1.0),
            alpha_deg: 15.0,
        });
        let json = config.to_json_string().unwrap();
        assert_eq!(NormalizeConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn rejects_out_of_range_tolerances() {
        assert!(matches!(
            NormalizeConfig::from_json_str(r#"{ "node_tolerance": -0.01 }"#),
            Err(Error::InvalidParameter { name: "node_tolerance", .. })
        ));
        assert!(NormalizeConfig::from_json_str(r#"{ "grid": { "eps_deg": 0 } }"#).is_err());
        assert!(NormalizeConfig::from_json_str(r#"{ "angle_eps_deg": 0 }"#).is_err());
        assert!(matches!(
            NormalizeConfig::from_json_str("{ not json"),
            Err(Error::Config(_))
        ));
    }
}
