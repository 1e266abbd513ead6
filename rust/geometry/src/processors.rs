// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall and slab processors.
//!
//! Both share the same pipeline (axes → projection → partition → merge →
//! re-projection) and differ only in plane checks and in how each final
//! rectangle becomes a domain element.

use nalgebra::Point3;
use strucnorm_core::{
    Diagnostics, ElementId, ElementProps, Error, FrameRole, Model, NodeId, NodeStore, Result,
    ShellInput, ShellKind, Stage, StructuralElement,
};

use crate::bool2d::Polygon2D;
use crate::decompose::{decompose, Rect2};
use crate::local_frame::{LocalFrame, PlaneOrientation, COPLANAR_TOLERANCE};
use crate::ring::{check_openings, check_points, open_ring, validate_ring};

/// Width/height ratio above which a wall rectangle becomes a spandrel frame.
pub const SPANDREL_ASPECT_RATIO: f64 = 4.0;

/// Tolerance for matching a rectangle edge to the parent wall's top or bottom.
const EDGE_TOLERANCE: f64 = 1e-6;

/// Everything an element builder needs to know about the parent shell.
#[derive(Debug, Clone)]
pub struct ShellContext<'a> {
    pub input: &'a ShellInput,
    pub frame: LocalFrame,
    /// V extent of the parent exterior ring in local coordinates.
    pub v_min: f64,
    pub v_max: f64,
}

impl ShellContext<'_> {
    /// Parent properties carried over to every generated element.
    fn child_props(&self) -> ElementProps {
        let mut props = self.input.props.clone();
        if let Some(height) = self.input.height {
            props
                .parameters
                .insert("height".to_string(), format!("{height}"));
        }
        props
    }
}

/// Turns one planar shell into analysis-ready elements.
pub trait ShellProcessor {
    fn kind(&self) -> ShellKind;

    /// Rejects shells whose points leave the plane.
    fn check_plane(
        &self,
        frame: &LocalFrame,
        exterior: &[Point3<f64>],
        holes: &[Vec<Point3<f64>>],
    ) -> std::result::Result<(), String>;

    /// Builds the element for one final rectangle.
    fn build_element(
        &self,
        rect: &Rect2,
        ctx: &ShellContext<'_>,
        nodes: &mut NodeStore,
    ) -> Result<StructuralElement>;

    /// Decomposes `input` and adds the resulting elements to `model`.
    ///
    /// Errors are scoped to this shell; the caller decides whether to skip it.
    fn process(
        &self,
        model: &mut Model,
        input: &ShellInput,
        diags: &mut Diagnostics,
    ) -> Result<Vec<ElementId>> {
        let id = input.props.external_id.as_str();
        let invalid = |reason: String| Error::invalid_geometry(id, reason);

        let exterior = open_ring(&input.exterior);
        check_points(&exterior).map_err(|d| invalid(format!("exterior: {d}")))?;
        let holes: Vec<Vec<[f64; 3]>> = input.holes.iter().map(|h| open_ring(h)).collect();
        for (i, hole) in holes.iter().enumerate() {
            check_points(hole).map_err(|d| invalid(format!("opening {i}: {d}")))?;
        }

        let exterior = to_points(&exterior);
        let holes: Vec<Vec<Point3<f64>>> = holes.iter().map(|h| to_points(h)).collect();

        let frame = LocalFrame::from_exterior(&exterior)
            .ok_or_else(|| invalid("empty exterior ring".to_string()))?;
        self.check_plane(&frame, &exterior, &holes).map_err(invalid)?;

        let outer_2d = frame.project_ring(&exterior);
        validate_ring(&outer_2d).map_err(|d| invalid(format!("exterior: {d}")))?;
        let mut holes_2d = Vec::with_capacity(holes.len());
        for (i, hole) in holes.iter().enumerate() {
            let ring = frame.project_ring(hole);
            validate_ring(&ring).map_err(|d| invalid(format!("opening {i}: {d}")))?;
            holes_2d.push(ring);
        }
        check_openings(&outer_2d, &holes_2d).map_err(|d| invalid(d.to_string()))?;

        let (v_min, v_max) = outer_2d
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));

        let decomposition = decompose(&Polygon2D::with_holes(outer_2d, holes_2d));
        for warning in &decomposition.warnings {
            diags.warn(Stage::Decompose, Some(id), warning.clone());
        }
        if decomposition.rects.is_empty() {
            return Err(invalid("decomposition produced no panels".to_string()));
        }

        let ctx = ShellContext {
            input,
            frame,
            v_min,
            v_max,
        };
        let elements = decomposition
            .rects
            .iter()
            .map(|rect| self.build_element(rect, &ctx, &mut model.nodes))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            element = id,
            kind = ?self.kind(),
            created = elements.len(),
            "Processed shell"
        );
        Ok(elements.into_iter().map(|e| model.push_element(e)).collect())
    }
}

/// Splits walls into piers (wall panels) and spandrels (frames).
#[derive(Debug, Default, Clone, Copy)]
pub struct WallProcessor;

impl ShellProcessor for WallProcessor {
    fn kind(&self) -> ShellKind {
        ShellKind::Wall
    }

    fn check_plane(
        &self,
        frame: &LocalFrame,
        exterior: &[Point3<f64>],
        holes: &[Vec<Point3<f64>>],
    ) -> std::result::Result<(), String> {
        let worst = exterior
            .iter()
            .chain(holes.iter().flatten())
            .map(|p| frame.plane_offset(p).abs())
            .fold(0.0, f64::max);
        if worst > COPLANAR_TOLERANCE {
            return Err(format!("points leave the wall plane by {worst:.4} m"));
        }
        Ok(())
    }

    fn build_element(
        &self,
        rect: &Rect2,
        ctx: &ShellContext<'_>,
        nodes: &mut NodeStore,
    ) -> Result<StructuralElement> {
        let corners = register_corners(rect, &ctx.frame, nodes)?;

        match rect.aspect_ratio() {
            Some(ratio) if ratio > SPANDREL_ASPECT_RATIO => {
                // axis on the parent's top edge when the strip reaches it,
                // otherwise on the strip's bottom edge
                let v = if (rect.max_v - ctx.v_max).abs() <= EDGE_TOLERANCE {
                    rect.max_v
                } else {
                    rect.min_v
                };
                let start = nodes.get_or_create_point(&ctx.frame.unproject(rect.min_u, v))?;
                let end = nodes.get_or_create_point(&ctx.frame.unproject(rect.max_u, v))?;

                let mut props = ctx.child_props();
                props.section = format!("SPANDREL_{}", ctx.input.props.section);
                Ok(StructuralElement::frame(props, FrameRole::Spandrel, start, end))
            }
            _ => Ok(StructuralElement::wall(ctx.child_props(), corners)),
        }
    }
}

/// Turns every slab rectangle into a horizontal shell panel.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlabProcessor;

impl ShellProcessor for SlabProcessor {
    fn kind(&self) -> ShellKind {
        ShellKind::Slab
    }

    fn check_plane(
        &self,
        frame: &LocalFrame,
        exterior: &[Point3<f64>],
        holes: &[Vec<Point3<f64>>],
    ) -> std::result::Result<(), String> {
        if frame.orientation != PlaneOrientation::Horizontal {
            return Err("slab exterior is not horizontal".to_string());
        }
        let (lo, hi) = exterior
            .iter()
            .chain(holes.iter().flatten())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.z), hi.max(p.z)));
        if hi - lo >= COPLANAR_TOLERANCE {
            return Err(format!("slab points span {:.4} m in Z", hi - lo));
        }
        Ok(())
    }

    fn build_element(
        &self,
        rect: &Rect2,
        ctx: &ShellContext<'_>,
        nodes: &mut NodeStore,
    ) -> Result<StructuralElement> {
        let corners = register_corners(rect, &ctx.frame, nodes)?;
        Ok(StructuralElement::slab(ctx.child_props(), corners))
    }
}

/// Outcome of draining a model's shell queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecomposeReport {
    pub processed: usize,
    pub skipped: usize,
    pub created: usize,
}

/// Routes queued shells to the processor for their kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRouter {
    wall: WallProcessor,
    slab: SlabProcessor,
}

impl ShellRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn processor(&self, kind: ShellKind) -> &dyn ShellProcessor {
        match kind {
            ShellKind::Wall => &self.wall,
            ShellKind::Slab => &self.slab,
        }
    }

    /// Decomposes every queued shell. Invalid shells are skipped with a
    /// warning; the batch always runs to completion.
    pub fn process_pending(&self, model: &mut Model, diags: &mut Diagnostics) -> DecomposeReport {
        let mut report = DecomposeReport::default();
        for (kind, input) in model.take_pending_shells() {
            match self.processor(kind).process(model, &input, diags) {
                Ok(created) => {
                    report.processed += 1;
                    report.created += created.len();
                }
                Err(err) => {
                    report.skipped += 1;
                    diags.warn(Stage::Decompose, Some(&input.props.external_id), err.to_string());
                }
            }
        }
        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            created = report.created,
            "Shell decomposition complete"
        );
        report
    }
}

fn to_points(ring: &[[f64; 3]]) -> Vec<Point3<f64>> {
    ring.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect()
}

/// Registers the rectangle's corners (counter-clockwise from the lower-left).
fn register_corners(rect: &Rect2, frame: &LocalFrame, nodes: &mut NodeStore) -> Result<Vec<NodeId>> {
    rect.corners()
        .iter()
        .map(|c| nodes.get_or_create_point(&frame.unproject(c.x, c.y)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strucnorm_core::ElementKind;

    fn props(id: &str) -> ElementProps {
        ElementProps::new(id, "M20", "G30", "L1")
    }

    #[test]
    fn wide_strips_become_spandrels() {
        let mut model = Model::new("test");
        let mut diags = Diagnostics::new();
        let input = ShellInput::new(
            props("W1"),
            vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [10.0, 0.0, 3.0], [0.0, 0.0, 3.0]],
        )
        .with_hole(vec![[1.0, 0.0, 1.0], [9.0, 0.0, 1.0], [9.0, 0.0, 2.5], [1.0, 0.0, 2.5]]);

        let ids = WallProcessor.process(&mut model, &input, &mut diags).unwrap();
        assert_eq!(ids.len(), 4);

        let spandrels: Vec<_> = model.spandrels().collect();
        assert_eq!(spandrels.len(), 2);
        assert!(spandrels.iter().all(|s| s.props.section == "SPANDREL_M20"));

        // head strip sits on the wall top, sill strip on the wall base
        let mut levels: Vec<f64> = spandrels
            .iter()
            .map(|s| s.coordinates(&model.nodes)[0][2])
            .collect();
        levels.sort_by(f64::total_cmp);
        assert_eq!(levels, vec![0.0, 3.0]);
        assert_eq!(model.walls().count(), 2);
    }

    #[test]
    fn slab_panels_are_horizontal() {
        let mut model = Model::new("test");
        let mut diags = Diagnostics::new();
        let input = ShellInput::new(
            props("S1"),
            vec![[0.0, 0.0, 3.0], [6.0, 0.0, 3.0], [6.0, 4.0, 3.0], [0.0, 4.0, 3.0]],
        )
        .with_hole(vec![[2.0, 1.0, 3.0], [3.0, 1.0, 3.0], [3.0, 2.0, 3.0], [2.0, 2.0, 3.0]]);

        let ids = SlabProcessor.process(&mut model, &input, &mut diags).unwrap();
        assert!(!ids.is_empty());
        for id in ids {
            let slab = &model.elements[id];
            assert!(matches!(slab.kind, ElementKind::Slab { .. }));
            assert!(slab.coordinates(&model.nodes).iter().all(|c| c[2] == 3.0));
        }
    }

    #[test]
    fn sloped_slab_is_rejected() {
        let mut model = Model::new("test");
        let mut diags = Diagnostics::new();
        let input = ShellInput::new(
            props("S2"),
            vec![[0.0, 0.0, 3.0], [6.0, 0.0, 3.5], [6.0, 4.0, 3.5], [0.0, 4.0, 3.0]],
        );
        assert!(matches!(
            SlabProcessor.process(&mut model, &input, &mut diags),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(model.elements.is_empty());
    }
}
