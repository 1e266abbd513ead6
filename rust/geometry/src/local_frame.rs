// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local (U, V) plane of a planar shell.
//!
//! Horizontal shells (Z range below 1 cm) use the global X and Y axes.
//! Vertical shells use the horizontal projection of their first edge as U
//! and the global Z axis as V. The origin is the first exterior point.

use nalgebra::{Point2, Point3, Vector3};

/// Planarity tolerance for shells (1 cm).
pub const COPLANAR_TOLERANCE: f64 = 0.01;

/// Shortest first edge accepted as a U direction.
const MIN_AXIS_LENGTH: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneOrientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalFrame {
    pub origin: Point3<f64>,
    pub u_axis: Vector3<f64>,
    pub v_axis: Vector3<f64>,
    pub orientation: PlaneOrientation,
}

impl LocalFrame {
    /// Derives the local axes from an exterior ring. Returns `None` for an
    /// empty ring.
    pub fn from_exterior(points: &[Point3<f64>]) -> Option<Self> {
        let p0 = *points.first()?;

        let (z_min, z_max) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)));

        if z_max - z_min < COPLANAR_TOLERANCE {
            return Some(Self {
                origin: p0,
                u_axis: Vector3::x(),
                v_axis: Vector3::y(),
                orientation: PlaneOrientation::Horizontal,
            });
        }

        let mut u = points.get(1).map_or(Vector3::zeros(), |p1| p1 - p0);
        u.z = 0.0;
        let u_axis = if u.norm() < MIN_AXIS_LENGTH {
            // first two points coincide in plan
            Vector3::x()
        } else {
            u.normalize()
        };

        Some(Self {
            origin: p0,
            u_axis,
            v_axis: Vector3::z(),
            orientation: PlaneOrientation::Vertical,
        })
    }

    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let rel = p - self.origin;
        Point2::new(rel.dot(&self.u_axis), rel.dot(&self.v_axis))
    }

    pub fn project_ring(&self, ring: &[Point3<f64>]) -> Vec<Point2<f64>> {
        ring.iter().map(|p| self.project(p)).collect()
    }

    /// Maps local coordinates back to 3D: `origin + u·U + v·V`.
    pub fn unproject(&self, u: f64, v: f64) -> Point3<f64> {
        self.origin + self.u_axis * u + self.v_axis * v
    }

    /// Signed distance of `p` from the shell plane.
    pub fn plane_offset(&self, p: &Point3<f64>) -> f64 {
        let normal = self.u_axis.cross(&self.v_axis);
        (p - self.origin).dot(&normal)
    }
}
