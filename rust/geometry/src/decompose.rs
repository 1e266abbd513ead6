// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orthogonal partition of a holed polygon into axis-aligned rectangles.
//!
//! 1. Cut the polygon into vertical strips at every distinct U coordinate of
//!    the exterior and hole rings.
//! 2. Replace every strip piece by its bounding box and drop duplicates.
//! 3. Merge boxes sharing the same V band whose U extents touch.

use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use nalgebra::Point2;
use rustc_hash::{FxHashSet, FxHasher};

use crate::bool2d::{intersect_box, Polygon2D, EPSILON_2D, MIN_AREA_THRESHOLD};

/// Relative area mismatch above which a strip piece is reported as not
/// axis-aligned.
const ORTHOGONALITY_TOLERANCE: f64 = 1e-6;

/// Distance within which a clipped edge is pulled back onto a source
/// coordinate.
const BREAK_SNAP_TOLERANCE: f64 = 1e-6;

/// Axis-aligned rectangle in a shell's local plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect2 {
    pub min_u: f64,
    pub min_v: f64,
    pub max_u: f64,
    pub max_v: f64,
}

impl Rect2 {
    pub fn new(min_u: f64, min_v: f64, max_u: f64, max_v: f64) -> Self {
        Self { min_u, min_v, max_u, max_v }
    }

    pub fn width(&self) -> f64 {
        self.max_u - self.min_u
    }

    pub fn height(&self) -> f64 {
        self.max_v - self.min_v
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Width over height; `None` for a zero-height rectangle.
    pub fn aspect_ratio(&self) -> Option<f64> {
        let h = self.height();
        (h > EPSILON_2D).then(|| self.width() / h)
    }

    /// Corners counter-clockwise from (min_u, min_v), without a closing point.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        [
            Point2::new(self.min_u, self.min_v),
            Point2::new(self.max_u, self.min_v),
            Point2::new(self.max_u, self.max_v),
            Point2::new(self.min_u, self.max_v),
        ]
    }

    /// Overlap area with another rectangle.
    pub fn overlap_area(&self, other: &Rect2) -> f64 {
        let w = self.max_u.min(other.max_u) - self.min_u.max(other.min_u);
        let h = self.max_v.min(other.max_v) - self.min_v.max(other.min_v);
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }

    fn key(&self) -> (i64, i64, i64, i64) {
        (snap(self.min_u), snap(self.min_v), snap(self.max_u), snap(self.max_v))
    }
}

/// Rectangles covering a polygon, plus anything worth reporting.
#[derive(Debug, Clone, Default)]
pub struct Decomposition {
    pub rects: Vec<Rect2>,
    pub warnings: Vec<String>,
}

impl Decomposition {
    pub fn total_area(&self) -> f64 {
        self.rects.iter().map(Rect2::area).sum()
    }
}

/// Runs the full partition → canonicalize → merge pipeline.
pub fn decompose(polygon: &Polygon2D) -> Decomposition {
    let mut warnings = Vec::new();
    let pieces = orthogonal_partition(polygon, &mut warnings);
    let boxes = canonicalize(&pieces, polygon, &mut warnings);
    let rects = merge_horizontal(&boxes);

    tracing::debug!(
        pieces = pieces.len(),
        boxes = boxes.len(),
        rects = rects.len(),
        "Decomposed shell polygon"
    );
    Decomposition { rects, warnings }
}

/// Intersects the polygon with the vertical strip between every pair of
/// consecutive distinct U coordinates. Every returned piece is hole-free.
pub fn orthogonal_partition(polygon: &Polygon2D, warnings: &mut Vec<String>) -> Vec<Polygon2D> {
    let Some((min, max)) = polygon.bounds() else {
        return Vec::new();
    };

    let mut us: Vec<f64> = polygon.vertices().map(|p| p.x).collect();
    us.sort_by(|a, b| a.total_cmp(b));
    us.dedup_by(|a, b| (*a - *b).abs() <= EPSILON_2D);

    let mut pieces = Vec::new();
    for pair in us.windows(2) {
        let (u0, u1) = (pair[0], pair[1]);
        for piece in intersect_box(polygon, Point2::new(u0, min.y), Point2::new(u1, max.y)) {
            if piece.holes.is_empty() {
                pieces.push(piece);
            } else {
                warnings.push(format!(
                    "strip [{u0:.3}, {u1:.3}] produced a piece with {} hole(s); piece dropped",
                    piece.holes.len()
                ));
            }
        }
    }
    pieces
}

/// Replaces pieces by their bounding boxes and removes duplicates.
///
/// Box edges are snapped back onto the U/V coordinates of `source`, undoing
/// the fixed-point rounding of the clipper.
pub fn canonicalize(pieces: &[Polygon2D], source: &Polygon2D, warnings: &mut Vec<String>) -> Vec<Rect2> {
    let us = sorted_breaks(source.vertices().map(|p| p.x));
    let vs = sorted_breaks(source.vertices().map(|p| p.y));
    let mut seen = FxHashSet::default();
    let mut boxes = Vec::with_capacity(pieces.len());

    for piece in pieces {
        let Some((min, max)) = piece.bounds() else {
            continue;
        };
        let rect = Rect2::new(
            snap_to_break(min.x, &us),
            snap_to_break(min.y, &vs),
            snap_to_break(max.x, &us),
            snap_to_break(max.y, &vs),
        );
        if rect.area() <= MIN_AREA_THRESHOLD {
            continue;
        }
        let piece_area = piece.area();
        if (rect.area() - piece_area).abs() > ORTHOGONALITY_TOLERANCE * rect.area().max(1.0) {
            warnings.push(format!(
                "non-orthogonal piece (area {piece_area:.4}) replaced by its bounding box (area {:.4})",
                rect.area()
            ));
        }
        if seen.insert(rect.key()) {
            boxes.push(rect);
        }
    }
    boxes
}

/// Merges boxes with the same V band whose U extents touch.
///
/// Output is ordered by V band, then by U.
pub fn merge_horizontal(rects: &[Rect2]) -> Vec<Rect2> {
    let mut bands: IndexMap<(i64, i64), Vec<Rect2>, BuildHasherDefault<FxHasher>> =
        IndexMap::default();
    for r in rects {
        bands.entry((snap(r.min_v), snap(r.max_v))).or_default().push(*r);
    }

    let mut merged = Vec::with_capacity(rects.len());
    for (_, mut band) in bands {
        band.sort_by(|a, b| a.min_u.total_cmp(&b.min_u));
        let mut current = band[0];
        for r in band.into_iter().skip(1) {
            if (r.min_u - current.max_u).abs() <= EPSILON_2D {
                current.max_u = r.max_u;
            } else {
                merged.push(current);
                current = r;
            }
        }
        merged.push(current);
    }

    merged.sort_by(|a, b| {
        a.min_v
            .total_cmp(&b.min_v)
            .then(a.max_v.total_cmp(&b.max_v))
            .then(a.min_u.total_cmp(&b.min_u))
    });
    merged
}

fn sorted_breaks(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut breaks: Vec<f64> = values.collect();
    breaks.sort_by(f64::total_cmp);
    breaks.dedup_by(|a, b| (*a - *b).abs() <= EPSILON_2D);
    breaks
}

/// Nearest entry of `breaks` (ascending) within the snap tolerance, or
/// `value` itself.
fn snap_to_break(value: f64, breaks: &[f64]) -> f64 {
    let i = breaks.partition_point(|&b| b < value);
    [i.checked_sub(1), Some(i)]
        .into_iter()
        .flatten()
        .filter_map(|j| breaks.get(j).copied())
        .map(|b| (b, (b - value).abs()))
        .filter(|&(_, d)| d <= BREAK_SNAP_TOLERANCE)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(value, |(b, _)| b)
}

/// Quantizes a coordinate to the 2D epsilon grid.
fn snap(value: f64) -> i64 {
    (value / EPSILON_2D).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_ring(min_u: f64, min_v: f64, max_u: f64, max_v: f64) -> Vec<Point2<f64>> {
        Rect2::new(min_u, min_v, max_u, max_v).corners().to_vec()
    }

    fn assert_no_overlap(rects: &[Rect2]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(a.overlap_area(b) < 1e-9, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn plain_rectangle_stays_whole() {
        let d = decompose(&Polygon2D::new(rect_ring(0.0, 0.0, 5.0, 3.0)));
        assert_eq!(d.rects.len(), 1);
        assert!((d.total_area() - 15.0).abs() < 1e-9);
        assert!(d.warnings.is_empty());
    }

    #[test]
    fn window_gives_two_piers_sill_and_head() {
        let polygon = Polygon2D::with_holes(
            rect_ring(0.0, 0.0, 5.0, 3.0),
            vec![rect_ring(1.5, 1.0, 3.5, 2.0)],
        );
        let d = decompose(&polygon);

        assert_eq!(d.rects.len(), 4);
        assert!((d.total_area() - 13.0).abs() < 1e-6);
        assert_no_overlap(&d.rects);

        let full_height: Vec<_> = d
            .rects
            .iter()
            .filter(|r| (r.height() - 3.0).abs() < 1e-9)
            .collect();
        assert_eq!(full_height.len(), 2);
    }

    #[test]
    fn l_shape_is_covered_exactly() {
        let polygon = Polygon2D::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(0.0, 3.0),
        ]);
        let d = decompose(&polygon);
        assert!((d.total_area() - 6.0).abs() < 1e-6);
        assert_no_overlap(&d.rects);
        assert_eq!(d.rects.len(), 2);
    }

    #[test]
    fn two_doors_share_the_head_band() {
        // doors reaching the floor leave three piers and two lintels
        let polygon = Polygon2D::with_holes(
            rect_ring(0.0, 0.0, 10.0, 3.0),
            vec![rect_ring(1.0, 0.0, 2.0, 2.0), rect_ring(6.0, 0.0, 7.0, 2.0)],
        );
        let d = decompose(&polygon);
        assert_eq!(d.rects.len(), 5);
        assert!((d.total_area() - 26.0).abs() < 1e-6);
        assert_no_overlap(&d.rects);
    }

    #[test]
    fn merge_joins_touching_boxes_only() {
        let merged = merge_horizontal(&[
            Rect2::new(2.0, 0.0, 3.0, 1.0),
            Rect2::new(0.0, 0.0, 2.0, 1.0),
            Rect2::new(4.0, 0.0, 5.0, 1.0),
            Rect2::new(0.0, 1.0, 5.0, 2.0),
        ]);
        assert_eq!(
            merged,
            vec![
                Rect2::new(0.0, 0.0, 3.0, 1.0),
                Rect2::new(4.0, 0.0, 5.0, 1.0),
                Rect2::new(0.0, 1.0, 5.0, 2.0),
            ]
        );
    }

    #[test]
    fn canonicalize_flags_slanted_pieces() {
        let triangle = Polygon2D::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        ]);
        let mut warnings = Vec::new();
        let boxes = canonicalize(&[triangle.clone(), triangle.clone()], &triangle, &mut warnings);
        assert_eq!(boxes.len(), 1);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn edges_land_exactly_on_source_coordinates() {
        let polygon = Polygon2D::with_holes(
            rect_ring(0.0, 0.0, 5.3, 2.9),
            vec![rect_ring(2.2, 0.8, 3.7, 2.1)],
        );
        let d = decompose(&polygon);
        assert_no_overlap(&d.rects);

        let us = [0.0, 2.2, 3.7, 5.3];
        let vs = [0.0, 0.8, 2.1, 2.9];
        for r in &d.rects {
            assert!(us.contains(&r.min_u) && us.contains(&r.max_u), "{r:?}");
            assert!(vs.contains(&r.min_v) && vs.contains(&r.max_v), "{r:?}");
        }
    }

    #[test]
    fn snap_to_break_only_within_tolerance() {
        let breaks = [0.0, 0.8, 2.2];
        assert_eq!(snap_to_break(2.200000047683716, &breaks), 2.2);
        assert_eq!(snap_to_break(0.7999999970197678, &breaks), 0.8);
        assert_eq!(snap_to_break(1.5, &breaks), 1.5);
        assert_eq!(snap_to_break(-1e-8, &breaks), 0.0);
        assert_eq!(snap_to_break(3.0, &[]), 3.0);
    }

    #[test]
    fn aspect_ratio() {
        assert_eq!(Rect2::new(0.0, 0.0, 5.0, 1.0).aspect_ratio(), Some(5.0));
        assert_eq!(Rect2::new(0.0, 1.0, 5.0, 1.0).aspect_ratio(), None);
    }
}
