// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural grid lines and named grid systems.
//!
//! A grid line is stored in Hesse normal form: an orientation `angle_deg` in
//! `[0, 180)` and a signed offset `rho` measured along the normal
//! `θ = (angle_deg + 90) mod 180`.

use nalgebra::Point2;
use serde::Serialize;

use crate::angle::{intersect_hesse, normal_angle, normalize_angle};
use crate::error::{Error, Result};

/// Lines closer than this in rho are duplicates within a system.
pub const DUPLICATE_RHO_TOLERANCE: f64 = 1e-4;
/// Lines closer than this in angle (degrees) are duplicates within a system.
pub const DUPLICATE_ANGLE_TOLERANCE: f64 = 0.1;

/// How far drawable endpoints extend beyond the bounding box (metres).
const DRAW_MARGIN: f64 = 5.0;

/// Plan bounding box used to clip drawable grid lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox2 {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// A single labelled grid line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLine {
    pub label: String,
    pub angle_deg: f64,
    pub rho: f64,
}

impl GridLine {
    pub fn new(label: impl Into<String>, angle_deg: f64, rho: f64) -> Self {
        Self {
            label: label.into(),
            angle_deg: normalize_angle(angle_deg),
            rho,
        }
    }

    /// Two points spanning the line across `bbox`, extended past its edges
    /// so the drawn line always crosses the model.
    pub fn endpoints(&self, bbox: &BoundingBox2) -> (Point2<f64>, Point2<f64>) {
        let theta = normal_angle(self.angle_deg).to_radians();
        let (c, s) = (theta.cos(), theta.sin());

        if s.abs() > 1e-6 {
            let at_x = |x: f64| Point2::new(x, (self.rho - x * c) / s);
            (at_x(bbox.min_x - DRAW_MARGIN), at_x(bbox.max_x + DRAW_MARGIN))
        } else {
            let at_y = |y: f64| Point2::new((self.rho - y * s) / c, y);
            (at_y(bbox.min_y - DRAW_MARGIN), at_y(bbox.max_y + DRAW_MARGIN))
        }
    }

    /// Intersection with another line, `None` when parallel.
    pub fn intersection(&self, other: &GridLine) -> Option<Point2<f64>> {
        intersect_hesse(self.angle_deg, self.rho, other.angle_deg, other.rho)
    }

    /// Same line after translating the plane by `(dx, dy)` and then rotating
    /// it by `alpha_deg` about the new origin.
    ///
    /// The offset is shifted in the old frame first. When the rotated normal
    /// ends up opposite to the canonical normal of the new angle, the offset
    /// changes sign.
    pub fn transformed(&self, dx: f64, dy: f64, alpha_deg: f64) -> GridLine {
        let theta_old = normal_angle(self.angle_deg);
        let t = theta_old.to_radians();
        let shifted = self.rho + dx * t.cos() + dy * t.sin();

        let angle = normalize_angle(self.angle_deg + alpha_deg);
        let turn = (theta_old + alpha_deg - normal_angle(angle)).rem_euclid(360.0);
        let flipped = (turn - 180.0).abs() < 1e-6;

        GridLine {
            label: self.label.clone(),
            angle_deg: angle,
            rho: if flipped { -shifted } else { shifted },
        }
    }
}

/// A named, prefixed set of grid lines (typically two orthogonal families).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridSystem {
    pub name: String,
    pub prefix: String,
    pub lines: Vec<GridLine>,
    /// Accumulated translation applied since creation.
    pub dx: f64,
    pub dy: f64,
    /// Accumulated rotation (degrees) applied since creation.
    pub angle: f64,
}

impl GridSystem {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            lines: Vec::new(),
            dx: 0.0,
            dy: 0.0,
            angle: 0.0,
        }
    }

    /// Adds a line. A label collision is rejected and the existing line kept.
    pub fn add_line(&mut self, label: impl Into<String>, angle_deg: f64, rho: f64) -> Result<&GridLine> {
        let label = label.into();
        if self.lines.iter().any(|g| g.label == label) {
            tracing::warn!(system = %self.name, label = %label, "Grid line already exists");
            return Err(Error::DuplicateEntity {
                kind: "grid line",
                name: format!("{}/{}", self.name, label),
            });
        }
        self.lines.push(GridLine::new(label, angle_deg, rho));
        Ok(&self.lines[self.lines.len() - 1])
    }

    /// True when a line with the same angle and rho (within tolerance) exists.
    pub fn contains_line(&self, angle_deg: f64, rho: f64) -> bool {
        self.lines.iter().any(|g| {
            (g.rho - rho).abs() < DUPLICATE_RHO_TOLERANCE
                && crate::angle::angular_distance(g.angle_deg, angle_deg) < DUPLICATE_ANGLE_TOLERANCE
        })
    }

    pub fn line(&self, label: &str) -> Option<&GridLine> {
        self.lines.iter().find(|g| g.label == label)
    }

    /// Re-derives every line after a rigid model transform.
    pub fn apply_transform(&mut self, dx: f64, dy: f64, alpha_deg: f64) {
        for line in &mut self.lines {
            *line = line.transformed(dx, dy, alpha_deg);
        }
        self.dx += dx;
        self.dy += dy;
        self.angle = normalize_angle(self.angle + alpha_deg);
    }
}

/// Counts reported by [`GridRegistry::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSummary {
    pub systems: usize,
    pub lines: usize,
}

/// Every grid system of a model.
#[derive(Debug, Clone, Default)]
pub struct GridRegistry {
    systems: Vec<GridSystem>,
}

impl GridRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a system. A name collision is rejected and the existing system kept.
    pub fn add_system(&mut self, system: GridSystem) -> Result<&mut GridSystem> {
        if self.systems.iter().any(|s| s.name == system.name) {
            tracing::warn!(system = %system.name, "Grid system already exists");
            return Err(Error::DuplicateEntity {
                kind: "grid system",
                name: system.name,
            });
        }
        self.systems.push(system);
        let last = self.systems.len() - 1;
        Ok(&mut self.systems[last])
    }

    pub fn systems(&self) -> &[GridSystem] {
        &self.systems
    }

    pub fn system(&self, name: &str) -> Option<&GridSystem> {
        self.systems.iter().find(|s| s.name == name)
    }

    /// Flat list of every line in every system.
    pub fn all_lines(&self) -> Vec<&GridLine> {
        self.systems.iter().flat_map(|s| s.lines.iter()).collect()
    }

    pub fn clear(&mut self) {
        self.systems.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn apply_transform(&mut self, dx: f64, dy: f64, alpha_deg: f64) {
        for system in &mut self.systems {
            system.apply_transform(dx, dy, alpha_deg);
        }
    }

    pub fn summary(&self) -> GridSummary {
        GridSummary {
            systems: self.systems.len(),
            lines: self.systems.iter().map(|s| s.lines.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn grid_lines_intersect() {
        let a = GridLine::new("A-A", 0.0, 5.0);
        let b = GridLine::new("A-1", 90.0, 3.0);
        let p = a.intersection(&b).unwrap();
        assert_abs_diff_eq!(p.x, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 5.0, epsilon = 1e-9);
        assert!(a.intersection(&GridLine::new("A-B", 0.0, 8.0)).is_none());
    }

    #[test]
    fn drawable_endpoints() {
        let bbox = BoundingBox2 { min_x: 0.0, max_x: 10.0, min_y: 0.0, max_y: 6.0 };

        let (p, q) = GridLine::new("A-A", 0.0, 2.0).endpoints(&bbox);
        assert_abs_diff_eq!(p.x, -5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.x, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, 2.0, epsilon = 1e-9);

        let (p, q) = GridLine::new("A-1", 90.0, 4.0).endpoints(&bbox);
        assert_abs_diff_eq!(p.x, 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, -5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(q.y, 11.0, epsilon = 1e-9);
    }

    #[test]
    fn translation_shifts_rho() {
        // y = 5 moved up by 2 becomes y = 7
        let line = GridLine::new("A-A", 0.0, 5.0).transformed(1.0, 2.0, 0.0);
        assert_abs_diff_eq!(line.rho, 7.0, epsilon = 1e-9);
        assert_abs_diff_eq!(line.angle_deg, 0.0);
    }

    #[test]
    fn rotation_keeps_lines_through_rotated_points() {
        // y = 5 rotated 90° CCW is x = -5
        let line = GridLine::new("A-A", 0.0, 5.0).transformed(0.0, 0.0, 90.0);
        assert_abs_diff_eq!(line.angle_deg, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(line.rho, -5.0, epsilon = 1e-9);

        // a point on the original line maps onto the rotated one
        let original = GridLine::new("A-1", 30.0, 2.0);
        let moved = original.transformed(1.5, -0.5, 70.0);
        let t = normal_angle(30.0).to_radians();
        let (px, py) = (2.0 * t.cos(), 2.0 * t.sin());
        let (tx, ty) = (px + 1.5, py - 0.5);
        let a = 70f64.to_radians();
        let (rx, ry) = (tx * a.cos() - ty * a.sin(), tx * a.sin() + ty * a.cos());
        assert_abs_diff_eq!(crate::angle::hesse_rho(rx, ry, moved.angle_deg), moved.rho, epsilon = 1e-9);
    }

    #[test]
    fn system_rejects_duplicate_labels() {
        let mut system = GridSystem::new("G1", "A");
        system.add_line("A-A", 0.0, 0.0).unwrap();
        assert!(system.add_line("A-A", 0.0, 4.0).is_err());
        assert!(system.contains_line(0.00001, 0.00001));
        assert!(!system.contains_line(0.0, 1.0));
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let mut grids = GridRegistry::new();
        grids.add_system(GridSystem::new("G1", "A")).unwrap().add_line("A-A", 0.0, 1.0).unwrap();
        assert!(matches!(
            grids.add_system(GridSystem::new("G1", "B")),
            Err(Error::DuplicateEntity { kind: "grid system", .. })
        ));
        assert_eq!(grids.summary(), GridSummary { systems: 1, lines: 1 });
        assert_eq!(grids.all_lines()[0].label, "A-A");
    }
}
