// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural elements of the analytical model.
//!
//! Elements are a closed sum type over frames, wall panels and slab panels.
//! They never own nodes: every vertex is a [`NodeId`] into the model's
//! [`NodeStore`].

use std::collections::BTreeMap;
use std::fmt;

use crate::angle::plan_angle;
use crate::node::{Node, NodeId, NodeMapping, NodeStore};

/// Plan lengths below this are treated as a zero direction vector.
pub const PLAN_EPSILON: f64 = 1e-9;

/// Index of an element inside [`crate::Model::elements`].
pub type ElementId = usize;

/// Properties shared by every element variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementProps {
    /// Identifier of the element in the authoring tool.
    pub external_id: String,
    pub section: String,
    pub material: String,
    pub level: String,
    /// Free-form parameters carried through from the source model.
    pub parameters: BTreeMap<String, String>,
}

impl ElementProps {
    pub fn new(
        external_id: impl Into<String>,
        section: impl Into<String>,
        material: impl Into<String>,
        level: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            section: section.into(),
            material: material.into(),
            level: level.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// What a frame element represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRole {
    Beam,
    Column,
    /// Slender wall strip over or under an opening, modelled as a line.
    Spandrel,
}

/// Variant-specific geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Frame {
        role: FrameRole,
        start: NodeId,
        end: NodeId,
    },
    /// Vertical shell panel; closed ring without a repeated last node.
    Wall { nodes: Vec<NodeId> },
    /// Horizontal shell panel; closed ring without a repeated last node.
    Slab { nodes: Vec<NodeId> },
}

/// Discriminant for element variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Frame,
    Wall,
    Slab,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Frame => "Frame",
            ElementType::Wall => "Wall",
            ElementType::Slab => "Slab",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structural element: shared properties plus variant geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralElement {
    pub props: ElementProps,
    pub kind: ElementKind,
}

impl StructuralElement {
    pub fn frame(props: ElementProps, role: FrameRole, start: NodeId, end: NodeId) -> Self {
        Self {
            props,
            kind: ElementKind::Frame { role, start, end },
        }
    }

    pub fn wall(props: ElementProps, nodes: Vec<NodeId>) -> Self {
        Self {
            props,
            kind: ElementKind::Wall { nodes },
        }
    }

    pub fn slab(props: ElementProps, nodes: Vec<NodeId>) -> Self {
        Self {
            props,
            kind: ElementKind::Slab { nodes },
        }
    }

    pub fn external_id(&self) -> &str {
        &self.props.external_id
    }

    pub fn element_type(&self) -> ElementType {
        match self.kind {
            ElementKind::Frame { .. } => ElementType::Frame,
            ElementKind::Wall { .. } => ElementType::Wall,
            ElementKind::Slab { .. } => ElementType::Slab,
        }
    }

    pub fn frame_role(&self) -> Option<FrameRole> {
        match self.kind {
            ElementKind::Frame { role, .. } => Some(role),
            _ => None,
        }
    }

    /// Node ids in element order (frame: start, end; shell: ring order).
    pub fn node_ids(&self) -> Vec<NodeId> {
        match &self.kind {
            ElementKind::Frame { start, end, .. } => vec![*start, *end],
            ElementKind::Wall { nodes } | ElementKind::Slab { nodes } => nodes.clone(),
        }
    }

    /// The node every rotation of this element pivots on.
    pub fn leading_node(&self) -> Option<NodeId> {
        match &self.kind {
            ElementKind::Frame { start, .. } => Some(*start),
            ElementKind::Wall { nodes } | ElementKind::Slab { nodes } => nodes.first().copied(),
        }
    }

    /// The pair of nodes whose plan direction defines the element's angle.
    ///
    /// Frames use start→end. Walls use the first two ring nodes, or the first
    /// and third when the first two coincide in plan. Slabs have no angle.
    pub fn plan_axis(&self, store: &NodeStore) -> Option<(NodeId, NodeId)> {
        match &self.kind {
            ElementKind::Frame { start, end, .. } => {
                let (a, b) = (store.get(*start)?, store.get(*end)?);
                (a.plan_distance(b) >= PLAN_EPSILON).then_some((*start, *end))
            }
            ElementKind::Wall { nodes } => {
                if nodes.len() < 3 {
                    return None;
                }
                let n0 = store.get(nodes[0])?;
                let n1 = store.get(nodes[1])?;
                if n0.plan_distance(n1) >= PLAN_EPSILON {
                    return Some((nodes[0], nodes[1]));
                }
                let n2 = store.get(nodes[2])?;
                (n0.plan_distance(n2) >= PLAN_EPSILON).then_some((nodes[0], nodes[2]))
            }
            ElementKind::Slab { .. } => None,
        }
    }

    /// Planar orientation in `[0, 180)`.
    ///
    /// `None` means "not applicable": slabs, vertical columns and walls whose
    /// ring has no horizontal extent.
    pub fn angle(&self, store: &NodeStore) -> Option<f64> {
        let (a, b) = self.plan_axis(store)?;
        let (a, b) = (store.get(a)?, store.get(b)?);
        Some(plan_angle(b.x - a.x, b.y - a.y))
    }

    /// Length used for short-element pruning: endpoint distance for frames,
    /// plan length of the base edge for walls. Slabs are never pruned.
    pub fn characteristic_length(&self, store: &NodeStore) -> Option<f64> {
        match &self.kind {
            ElementKind::Frame { start, end, .. } => {
                Some(store.get(*start)?.distance(store.get(*end)?))
            }
            ElementKind::Wall { .. } => match self.plan_axis(store) {
                Some((a, b)) => Some(store.get(a)?.plan_distance(store.get(b)?)),
                None => Some(0.0),
            },
            ElementKind::Slab { .. } => None,
        }
    }

    /// Coordinates of every node, in element order.
    pub fn coordinates(&self, store: &NodeStore) -> Vec<[f64; 3]> {
        self.node_ids()
            .into_iter()
            .filter_map(|id| store.get(id).map(Node::coords))
            .collect()
    }

    /// Rewrites node references after a reindex.
    ///
    /// Consecutive duplicates in shell rings are collapsed. Returns `false`
    /// when the element became degenerate (frame endpoints merged, or a ring
    /// with fewer than 3 distinct nodes).
    pub fn remap(&mut self, mapping: &NodeMapping) -> bool {
        let resolve = |id: &NodeId| mapping.get(id).copied().unwrap_or(*id);
        match &mut self.kind {
            ElementKind::Frame { start, end, .. } => {
                *start = resolve(&*start);
                *end = resolve(&*end);
                *start != *end
            }
            ElementKind::Wall { nodes } | ElementKind::Slab { nodes } => {
                let mut ring: Vec<NodeId> = Vec::with_capacity(nodes.len());
                for id in nodes.iter().map(resolve) {
                    if ring.last() != Some(&id) {
                        ring.push(id);
                    }
                }
                while ring.len() > 1 && ring.first() == ring.last() {
                    ring.pop();
                }
                *nodes = ring;
                nodes.len() >= 3
            }
        }
    }

    /// Short geometry description for logs.
    pub fn summary(&self) -> String {
        match &self.kind {
            ElementKind::Frame { role, start, end } => {
                format!("{role:?} {} from {start} to {end}", self.props.external_id)
            }
            ElementKind::Wall { nodes } => {
                format!("Wall {} with {} nodes on {}", self.props.external_id, nodes.len(), self.props.level)
            }
            ElementKind::Slab { nodes } => {
                format!("Slab {} with {} nodes on {}", self.props.external_id, nodes.len(), self.props.level)
            }
        }
    }
}

impl fmt::Display for StructuralElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} ID:{} Sec:{}>",
            self.element_type(),
            self.props.external_id,
            self.props.section
        )
    }
}
