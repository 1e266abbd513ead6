// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The analytical model: one owner for nodes, elements, stories and grids.

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::diagnostics::{Diagnostics, Stage};
use crate::element::{ElementId, ElementKind, ElementProps, FrameRole, StructuralElement};
use crate::error::{Error, Result};
use crate::grid::GridRegistry;
use crate::node::{NodeId, NodeMapping, NodeStore};
use crate::story::StoryManager;

/// Raw planar shell geometry waiting for decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellInput {
    pub props: ElementProps,
    /// Exterior ring in metres, without a repeated closing point.
    pub exterior: Vec<[f64; 3]>,
    /// Opening rings.
    pub holes: Vec<Vec<[f64; 3]>>,
    /// Nominal height reported by the authoring tool.
    pub height: Option<f64>,
}

impl ShellInput {
    pub fn new(props: ElementProps, exterior: Vec<[f64; 3]>) -> Self {
        Self {
            props,
            exterior,
            holes: Vec::new(),
            height: None,
        }
    }

    pub fn with_hole(mut self, hole: Vec<[f64; 3]>) -> Self {
        self.holes.push(hole);
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }
}

/// Which processor a raw shell is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Wall,
    Slab,
}

/// Element and entity counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModelSummary {
    pub nodes: usize,
    pub beams: usize,
    pub columns: usize,
    pub spandrels: usize,
    pub walls: usize,
    pub slabs: usize,
    pub stories: usize,
    pub grid_systems: usize,
    pub grid_lines: usize,
}

/// Analytical structural model.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub nodes: NodeStore,
    pub elements: Vec<StructuralElement>,
    pub stories: StoryManager,
    pub grids: GridRegistry,
    pending_shells: Vec<(ShellKind, ShellInput)>,
}

impl Model {
    /// Creates a model with the default 5 mm node tolerance.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: NodeStore::default(),
            elements: Vec::new(),
            stories: StoryManager::new(),
            grids: GridRegistry::new(),
            pending_shells: Vec::new(),
        }
    }

    pub fn with_tolerance(name: impl Into<String>, tolerance: f64) -> Result<Self> {
        let mut model = Self::new(name);
        model.nodes = NodeStore::new(tolerance)?;
        Ok(model)
    }

    /// Registers both endpoints and adds a frame element.
    pub fn add_frame(
        &mut self,
        props: ElementProps,
        role: FrameRole,
        p1: [f64; 3],
        p2: [f64; 3],
    ) -> Result<ElementId> {
        let start = self.nodes.get_or_create(p1[0], p1[1], p1[2]).map_err(|_| {
            Error::invalid_geometry(&props.external_id, format!("non-finite start point {p1:?}"))
        })?;
        let end = self.nodes.get_or_create(p2[0], p2[1], p2[2]).map_err(|_| {
            Error::invalid_geometry(&props.external_id, format!("non-finite end point {p2:?}"))
        })?;
        if start == end {
            return Err(Error::invalid_geometry(
                &props.external_id,
                "frame endpoints collapse onto the same node",
            ));
        }
        Ok(self.push_element(StructuralElement::frame(props, role, start, end)))
    }

    /// Queues a wall outline (with optional openings) for decomposition.
    pub fn add_wall_input(&mut self, input: ShellInput) {
        self.pending_shells.push((ShellKind::Wall, input));
    }

    /// Queues a slab outline (with optional openings) for decomposition.
    pub fn add_slab_input(&mut self, input: ShellInput) {
        self.pending_shells.push((ShellKind::Slab, input));
    }

    pub fn pending_shell_count(&self) -> usize {
        self.pending_shells.len()
    }

    /// Drains the decomposition queue in submission order.
    pub fn take_pending_shells(&mut self) -> Vec<(ShellKind, ShellInput)> {
        std::mem::take(&mut self.pending_shells)
    }

    pub fn push_element(&mut self, element: StructuralElement) -> ElementId {
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn frames(&self) -> impl Iterator<Item = &StructuralElement> {
        self.elements
            .iter()
            .filter(|e| matches!(e.kind, ElementKind::Frame { .. }))
    }

    fn frames_with_role(&self, wanted: FrameRole) -> impl Iterator<Item = &StructuralElement> {
        self.elements.iter().filter(move |e| e.frame_role() == Some(wanted))
    }

    pub fn beams(&self) -> impl Iterator<Item = &StructuralElement> {
        self.frames_with_role(FrameRole::Beam)
    }

    pub fn columns(&self) -> impl Iterator<Item = &StructuralElement> {
        self.frames_with_role(FrameRole::Column)
    }

    pub fn spandrels(&self) -> impl Iterator<Item = &StructuralElement> {
        self.frames_with_role(FrameRole::Spandrel)
    }

    pub fn walls(&self) -> impl Iterator<Item = &StructuralElement> {
        self.elements
            .iter()
            .filter(|e| matches!(e.kind, ElementKind::Wall { .. }))
    }

    pub fn slabs(&self) -> impl Iterator<Item = &StructuralElement> {
        self.elements
            .iter()
            .filter(|e| matches!(e.kind, ElementKind::Slab { .. }))
    }

    /// Every node id referenced by at least one element.
    pub fn referenced_node_ids(&self) -> FxHashSet<NodeId> {
        self.elements.iter().flat_map(|e| e.node_ids()).collect()
    }

    /// Reindexes the node store and rewrites every element reference.
    ///
    /// Elements that become degenerate (frame endpoints merged, shell ring
    /// below 3 nodes) are dropped with a warning.
    pub fn reindex(&mut self, tolerance: Option<f64>, diags: &mut Diagnostics) -> Result<NodeMapping> {
        let before = self.nodes.len();
        let mapping = self.nodes.reindex(tolerance)?;
        let merged = before - self.nodes.len();

        let mut dropped = Vec::new();
        self.elements.retain_mut(|element| {
            let keep = element.remap(&mapping);
            if !keep {
                dropped.push(element.props.external_id.clone());
            }
            keep
        });
        for id in &dropped {
            diags.warn(
                Stage::NodeStore,
                Some(id),
                "element collapsed after node merge and was removed",
            );
        }
        if merged > 0 {
            diags.info(
                Stage::NodeStore,
                format!(
                    "reindex at tolerance {} merged {merged} nodes ({} remain)",
                    self.nodes.tolerance(),
                    self.nodes.len()
                ),
            );
        }
        Ok(mapping)
    }

    pub fn summary(&self) -> ModelSummary {
        let grids = self.grids.summary();
        ModelSummary {
            nodes: self.nodes.len(),
            beams: self.beams().count(),
            columns: self.columns().count(),
            spandrels: self.spandrels().count(),
            walls: self.walls().count(),
            slabs: self.slabs().count(),
            stories: self.stories.len(),
            grid_systems: grids.systems,
            grid_lines: grids.lines,
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new("Structural Model")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(id: &str) -> ElementProps {
        ElementProps::new(id, "V30x60", "G30", "L1")
    }

    #[test]
    fn frames_share_nodes() {
        let mut model = Model::new("test");
        model
            .add_frame(props("B1"), FrameRole::Beam, [0.0, 0.0, 3.0], [5.0, 0.0, 3.0])
            .unwrap();
        model
            .add_frame(props("B2"), FrameRole::Beam, [5.0, 0.0, 3.0], [5.0, 4.0, 3.0])
            .unwrap();
        model
            .add_frame(props("C1"), FrameRole::Column, [5.0, 0.0, 0.0], [5.0, 0.0, 3.0])
            .unwrap();

        let summary = model.summary();
        assert_eq!(summary.nodes, 4);
        assert_eq!(summary.beams, 2);
        assert_eq!(summary.columns, 1);
        assert_eq!(model.frames().count(), 3);
    }

    #[test]
    fn rejects_degenerate_frames() {
        let mut model = Model::new("test");
        assert!(matches!(
            model.add_frame(props("B1"), FrameRole::Beam, [1.0, 1.0, 0.0], [1.0, 1.0, 0.0]),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(model
            .add_frame(props("B2"), FrameRole::Beam, [f64::NAN, 0.0, 0.0], [1.0, 1.0, 0.0])
            .is_err());
        assert!(model.elements.is_empty());
    }

    #[test]
    fn reindex_drops_collapsed_elements() {
        let mut model = Model::new("test");
        model
            .add_frame(props("B1"), FrameRole::Beam, [0.0, 0.0, 0.0], [0.02, 0.0, 0.0])
            .unwrap();
        model
            .add_frame(props("B2"), FrameRole::Beam, [0.0, 0.0, 0.0], [4.0, 0.0, 0.0])
            .unwrap();

        let mut diags = Diagnostics::new();
        model.reindex(Some(0.1), &mut diags).unwrap();

        assert_eq!(model.elements.len(), 1);
        assert_eq!(model.elements[0].external_id(), "B2");
        assert_eq!(diags.for_element("B1").count(), 1);
    }

    #[test]
    fn pending_shells_drain_in_order() {
        let mut model = Model::new("test");
        let ring = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0]];
        model.add_wall_input(ShellInput::new(props("W1"), ring.clone()));
        model.add_slab_input(ShellInput::new(props("S1"), ring).with_height(0.2));
        assert_eq!(model.pending_shell_count(), 2);

        let pending = model.take_pending_shells();
        assert_eq!(pending[0].0, ShellKind::Wall);
        assert_eq!(pending[1].1.props.external_id, "S1");
        assert_eq!(model.pending_shell_count(), 0);
    }
}
