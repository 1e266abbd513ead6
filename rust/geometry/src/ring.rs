// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring cleanup and validation.

use nalgebra::Point2;

use thiserror::Error;

use crate::bool2d::{
    compute_signed_area, intersection_area, union_area, EPSILON_2D, MIN_AREA_THRESHOLD,
};

/// Relative area mismatch tolerated by the opening checks.
const OPENING_AREA_TOLERANCE: f64 = 1e-5;

/// Why a ring was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RingDefect {
    #[error("ring has {0} points, at least 3 required")]
    TooFewPoints(usize),

    #[error("ring has a non-finite coordinate")]
    NonFinite,

    #[error("ring encloses no area")]
    ZeroArea,

    #[error("ring edges {edge_a} and {edge_b} intersect")]
    SelfIntersecting { edge_a: usize, edge_b: usize },

    #[error("opening {index} extends {outside:.4} m² beyond the exterior")]
    OpeningOutside { index: usize, outside: f64 },

    #[error("openings overlap by {overlap:.4} m²")]
    OverlappingOpenings { overlap: f64 },
}

/// Drops a repeated closing point and consecutive duplicate points.
pub fn open_ring(points: &[[f64; 3]]) -> Vec<[f64; 3]> {
    let same = |a: &[f64; 3], b: &[f64; 3]| {
        (a[0] - b[0]).abs() <= EPSILON_2D
            && (a[1] - b[1]).abs() <= EPSILON_2D
            && (a[2] - b[2]).abs() <= EPSILON_2D
    };
    let mut ring: Vec<[f64; 3]> = Vec::with_capacity(points.len());
    for p in points {
        if ring.last().map_or(true, |last| !same(last, p)) {
            ring.push(*p);
        }
    }
    while ring.len() > 1 && same(&ring[0], &ring[ring.len() - 1]) {
        ring.pop();
    }
    ring
}

/// Checks the 3D input before any projection.
pub fn check_points(points: &[[f64; 3]]) -> Result<(), RingDefect> {
    if points.iter().flatten().any(|c| !c.is_finite()) {
        return Err(RingDefect::NonFinite);
    }
    if points.len() < 3 {
        return Err(RingDefect::TooFewPoints(points.len()));
    }
    Ok(())
}

/// Validates a projected ring: at least 3 points, non-zero area and no
/// crossing between non-adjacent edges.
pub fn validate_ring(ring: &[Point2<f64>]) -> Result<(), RingDefect> {
    let n = ring.len();
    if n < 3 {
        return Err(RingDefect::TooFewPoints(n));
    }
    if compute_signed_area(ring).abs() <= MIN_AREA_THRESHOLD {
        return Err(RingDefect::ZeroArea);
    }
    for i in 0..n {
        let (a0, a1) = (ring[i], ring[(i + 1) % n]);
        for j in (i + 2)..n {
            // first and last edges share vertex 0
            if i == 0 && j == n - 1 {
                continue;
            }
            let (b0, b1) = (ring[j], ring[(j + 1) % n]);
            if segments_intersect(&a0, &a1, &b0, &b1) {
                return Err(RingDefect::SelfIntersecting { edge_a: i, edge_b: j });
            }
        }
    }
    Ok(())
}

/// Checks that every opening lies inside the exterior and that no two
/// openings overlap. Openings may touch each other or the exterior.
pub fn check_openings(outer: &[Point2<f64>], holes: &[Vec<Point2<f64>>]) -> Result<(), RingDefect> {
    let tolerance = |area: f64| OPENING_AREA_TOLERANCE * area.max(1.0);

    let mut total = 0.0;
    for (index, hole) in holes.iter().enumerate() {
        let area = compute_signed_area(hole).abs();
        let outside = area - intersection_area(hole, outer);
        if outside > tolerance(area) {
            return Err(RingDefect::OpeningOutside { index, outside });
        }
        total += area;
    }

    if holes.len() > 1 {
        let overlap = total - union_area(holes);
        if overlap > tolerance(total) {
            return Err(RingDefect::OverlappingOpenings { overlap });
        }
    }
    Ok(())
}

fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> bool {
    p.x >= a.x.min(b.x) - EPSILON_2D
        && p.x <= a.x.max(b.x) + EPSILON_2D
        && p.y >= a.y.min(b.y) - EPSILON_2D
        && p.y <= a.y.max(b.y) + EPSILON_2D
}

/// Closed-segment intersection test, touching counts.
fn segments_intersect(p1: &Point2<f64>, p2: &Point2<f64>, q1: &Point2<f64>, q2: &Point2<f64>) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);

    let straddles = |a: f64, b: f64| (a > EPSILON_2D && b < -EPSILON_2D) || (a < -EPSILON_2D && b > EPSILON_2D);
    if straddles(d1, d2) && straddles(d3, d4) {
        return true;
    }

    (d1.abs() <= EPSILON_2D && on_segment(q1, q2, p1))
        || (d2.abs() <= EPSILON_2D && on_segment(q1, q2, p2))
        || (d3.abs() <= EPSILON_2D && on_segment(p1, p2, q1))
        || (d4.abs() <= EPSILON_2D && on_segment(p1, p2, q2))
}
