// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D polygon operations in a shell's local (U, V) plane.
//!
//! Boolean clipping uses the i_overlay crate; the remaining helpers are
//! plain contour arithmetic.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::Point2;

/// Epsilon for floating point comparisons in 2D operations
pub const EPSILON_2D: f64 = 1e-9;

/// Minimum area threshold - polygons smaller than this are considered degenerate
pub const MIN_AREA_THRESHOLD: f64 = 1e-10;

/// Planar polygon with optional holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon2D {
    /// Outer boundary (counter-clockwise)
    pub outer: Vec<Point2<f64>>,
    /// Holes (clockwise)
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Polygon2D {
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer: ensure_ccw(&outer),
            holes: Vec::new(),
        }
    }

    pub fn with_holes(outer: Vec<Point2<f64>>, holes: Vec<Vec<Point2<f64>>>) -> Self {
        Self {
            outer: ensure_ccw(&outer),
            holes: holes.iter().map(|h| ensure_cw(h)).collect(),
        }
    }

    /// Net area: outer area minus hole areas.
    pub fn area(&self) -> f64 {
        compute_signed_area(&self.outer).abs()
            - self
                .holes
                .iter()
                .map(|h| compute_signed_area(h).abs())
                .sum::<f64>()
    }

    /// Bounds over the outer boundary.
    pub fn bounds(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        contour_bounds(&self.outer)
    }

    /// Every vertex of the outer boundary and the holes.
    pub fn vertices(&self) -> impl Iterator<Item = &Point2<f64>> {
        self.outer.iter().chain(self.holes.iter().flatten())
    }
}

/// Intersect a polygon with the axis-aligned box `[min, max]`.
///
/// Multi-part results are flattened into one polygon per part. Parts below
/// the area threshold are dropped.
pub fn intersect_box(polygon: &Polygon2D, min: Point2<f64>, max: Point2<f64>) -> Vec<Polygon2D> {
    let subject = polygon_to_paths(polygon);
    let clip = vec![vec![[min.x, min.y], [max.x, min.y], [max.x, max.y], [min.x, max.y]]];

    // Result is Vec<Vec<Vec<[f64; 2]>>> - Vec of shapes, each shape is Vec of contours
    let shapes = subject.overlay(&clip, OverlayRule::Intersect, FillRule::EvenOdd);
    shapes_to_polygons(&shapes)
}

/// Area of the union of `contours`, overlaps counted once.
pub fn union_area(contours: &[Vec<Point2<f64>>]) -> f64 {
    let Some((first, rest)) = contours.split_first() else {
        return 0.0;
    };
    if rest.is_empty() {
        return compute_signed_area(first).abs();
    }

    let subject = vec![contour_to_path(&ensure_ccw(first))];
    let clip: Vec<Vec<[f64; 2]>> = rest.iter().map(|c| contour_to_path(&ensure_ccw(c))).collect();

    // NonZero so overlapping clip contours are filled once
    let shapes = subject.overlay(&clip, OverlayRule::Union, FillRule::NonZero);
    shapes_to_polygons(&shapes).iter().map(Polygon2D::area).sum()
}

/// Area shared by two simple contours.
pub fn intersection_area(a: &[Point2<f64>], b: &[Point2<f64>]) -> f64 {
    let subject = vec![contour_to_path(&ensure_ccw(a))];
    let clip = vec![contour_to_path(&ensure_ccw(b))];
    let shapes = subject.overlay(&clip, OverlayRule::Intersect, FillRule::NonZero);
    shapes_to_polygons(&shapes).iter().map(Polygon2D::area).sum()
}

/// Compute the signed area of a 2D contour
/// Positive = counter-clockwise, Negative = clockwise
pub fn compute_signed_area(contour: &[Point2<f64>]) -> f64 {
    if contour.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = contour.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += contour[i].x * contour[j].y;
        area -= contour[j].x * contour[i].y;
    }

    area * 0.5
}

/// Ensure contour has counter-clockwise winding (positive area)
pub fn ensure_ccw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let area = compute_signed_area(contour);
    if area < 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Ensure contour has clockwise winding (for holes)
pub fn ensure_cw(contour: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let area = compute_signed_area(contour);
    if area > 0.0 {
        contour.iter().rev().cloned().collect()
    } else {
        contour.to_vec()
    }
}

/// Compute bounding box of a contour
pub fn contour_bounds(contour: &[Point2<f64>]) -> Option<(Point2<f64>, Point2<f64>)> {
    if contour.is_empty() {
        return None;
    }

    let mut min = contour[0];
    let mut max = contour[0];

    for p in contour.iter().skip(1) {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }

    Some((min, max))
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

/// Convert a polygon to i_overlay path format
fn polygon_to_paths(polygon: &Polygon2D) -> Vec<Vec<[f64; 2]>> {
    let mut paths = Vec::with_capacity(1 + polygon.holes.len());
    paths.push(contour_to_path(&ensure_ccw(&polygon.outer)));
    // holes wound clockwise; EvenOdd fill handles either winding
    for hole in &polygon.holes {
        paths.push(contour_to_path(&ensure_cw(hole)));
    }
    paths
}

/// Convert a Point2 contour to i_overlay path format
fn contour_to_path(contour: &[Point2<f64>]) -> Vec<[f64; 2]> {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

/// Convert i_overlay result shapes to polygons
///
/// Each shape is a list of contours: the first is the outer boundary, the
/// rest are holes.
fn shapes_to_polygons(shapes: &[Vec<Vec<[f64; 2]>>]) -> Vec<Polygon2D> {
    let to_points = |contour: &Vec<[f64; 2]>| -> Vec<Point2<f64>> {
        contour.iter().map(|p| Point2::new(p[0], p[1])).collect()
    };

    shapes
        .iter()
        .filter(|shape| !shape.is_empty())
        .filter_map(|shape| {
            let outer = to_points(&shape[0]);
            if compute_signed_area(&outer).abs() <= MIN_AREA_THRESHOLD {
                return None;
            }
            let holes = shape
                .iter()
                .skip(1)
                .map(to_points)
                .filter(|h| compute_signed_area(h).abs() > MIN_AREA_THRESHOLD)
                .collect();
            Some(Polygon2D::with_holes(outer, holes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ]
    }

    #[test]
    fn test_compute_signed_area_ccw() {
        let area = compute_signed_area(&square(0.0, 0.0, 1.0));
        assert!((area - 1.0).abs() < EPSILON_2D);
    }

    #[test]
    fn test_ensure_windings() {
        let cw: Vec<_> = square(0.0, 0.0, 1.0).into_iter().rev().collect();
        assert!(compute_signed_area(&ensure_ccw(&cw)) > 0.0);
        assert!(compute_signed_area(&ensure_cw(&square(0.0, 0.0, 1.0))) < 0.0);
    }

    #[test]
    fn test_polygon_net_area() {
        let polygon = Polygon2D::with_holes(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]);
        assert!((polygon.area() - 96.0).abs() < EPSILON_2D);
        assert_eq!(polygon.vertices().count(), 8);
    }

    #[test]
    fn test_intersect_box_splits_around_hole() {
        // 10x10 with a 2x2 hole; the strip x in [4, 6] is cut in two
        let polygon = Polygon2D::with_holes(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]);
        let parts = intersect_box(&polygon, Point2::new(4.0, 0.0), Point2::new(6.0, 10.0));

        assert_eq!(parts.len(), 2);
        let total: f64 = parts.iter().map(|p| p.area()).sum();
        assert!((total - 16.0).abs() < 1e-6);
        assert!(parts.iter().all(|p| p.holes.is_empty()));
    }

    #[test]
    fn test_intersect_box_outside_is_empty() {
        let polygon = Polygon2D::new(square(0.0, 0.0, 1.0));
        assert!(intersect_box(&polygon, Point2::new(5.0, 5.0), Point2::new(6.0, 6.0)).is_empty());
    }

    #[test]
    fn test_union_area_counts_overlap_once() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        assert!((union_area(&[a.clone(), b.clone()]) - 7.0).abs() < 1e-6);
        // edge-sharing squares do not overlap
        assert!((union_area(&[a.clone(), square(2.0, 0.0, 2.0)]) - 8.0).abs() < 1e-6);
        assert!((union_area(&[a.clone()]) - 4.0).abs() < EPSILON_2D);
        assert_eq!(union_area(&[]), 0.0);
    }

    #[test]
    fn test_intersection_area() {
        let outer = square(0.0, 0.0, 10.0);
        assert!((intersection_area(&square(9.0, 9.0, 2.0), &outer) - 1.0).abs() < 1e-6);
        assert!((intersection_area(&square(2.0, 2.0, 2.0), &outer) - 4.0).abs() < 1e-6);
        assert!(intersection_area(&square(20.0, 20.0, 1.0), &outer).abs() < 1e-9);
    }

    #[test]
    fn test_contour_bounds() {
        let (min, max) = contour_bounds(&square(-1.0, 2.0, 3.0)).unwrap();
        assert_eq!((min.x, min.y, max.x, max.y), (-1.0, 2.0, 2.0, 5.0));
        assert!(contour_bounds(&[]).is_none());
    }
}
