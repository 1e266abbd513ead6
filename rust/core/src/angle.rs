// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orientation and Hesse normal form helpers.
//!
//! Orientations are undirected: a direction `(dx, dy)` has angle
//! `atan2(dy, dx)` in degrees reduced modulo 180, so every angle lies in
//! `[0, 180)`. A line with orientation `angle` is written in Hesse normal
//! form `x·cos θ + y·sin θ = ρ` with `θ = (angle + 90) mod 180`.

use nalgebra::{Matrix2, Point2, Vector2};

/// Determinant magnitude below which two Hesse lines are treated as parallel.
pub const SINGULAR_EPSILON: f64 = 1e-9;

/// Reduce an angle in degrees into `[0, 180)`.
#[inline]
pub fn normalize_angle(angle_deg: f64) -> f64 {
    let a = angle_deg.rem_euclid(180.0);
    // rem_euclid can round up to exactly 180 for tiny negative inputs
    if a >= 180.0 {
        0.0
    } else {
        a
    }
}

/// Undirected plan angle of a direction vector, in `[0, 180)`.
#[inline]
pub fn plan_angle(dx: f64, dy: f64) -> f64 {
    normalize_angle(dy.atan2(dx).to_degrees())
}

/// Normal direction θ of a line with orientation `angle_deg`.
#[inline]
pub fn normal_angle(angle_deg: f64) -> f64 {
    normalize_angle(angle_deg + 90.0)
}

/// Signed offset ρ of the point `(x, y)` for lines oriented at `angle_deg`.
#[inline]
pub fn hesse_rho(x: f64, y: f64, angle_deg: f64) -> f64 {
    let theta = normal_angle(angle_deg).to_radians();
    x * theta.cos() + y * theta.sin()
}

/// Distance between two orientations, accounting for the 180° wrap.
#[inline]
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (normalize_angle(a) - normalize_angle(b)).abs();
    d.min(180.0 - d)
}

/// Smallest signed rotation (degrees, in `(-90, 90]`) taking orientation
/// `from` onto orientation `to`.
#[inline]
pub fn shortest_rotation(from: f64, to: f64) -> f64 {
    let mut delta = (to - from).rem_euclid(180.0);
    if delta > 90.0 {
        delta -= 180.0;
    }
    delta
}

/// Intersection of two lines given in Hesse normal form.
///
/// Returns `None` when the lines are parallel (singular system).
pub fn intersect_hesse(angle_a: f64, rho_a: f64, angle_b: f64, rho_b: f64) -> Option<Point2<f64>> {
    let ta = normal_angle(angle_a).to_radians();
    let tb = normal_angle(angle_b).to_radians();
    let m = Matrix2::new(ta.cos(), ta.sin(), tb.cos(), tb.sin());
    if m.determinant().abs() < SINGULAR_EPSILON {
        return None;
    }
    let solution = m.try_inverse()? * Vector2::new(rho_a, rho_b);
    Some(Point2::new(solution.x, solution.y))
}

/// Median of a slice (mean of the two middle values for even lengths).
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Round to a fixed number of decimal places.
#[inline]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}
