// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tolerance-keyed node registry.
//!
//! The [`NodeStore`] is the single owner of every analytical node. Elements
//! refer to nodes through stable [`NodeId`]s, so moving a node moves every
//! element that references it. Two points are the same node iff their
//! coordinates round to the same key under the store's tolerance.
//!
//! ## Iteration order
//!
//! Nodes are kept in insertion order. [`NodeStore::reindex`] walks them in
//! that order and the first node claiming a key survives, which makes merge
//! results deterministic.

use std::fmt;
use std::hash::BuildHasherDefault;

use indexmap::IndexMap;
use nalgebra::Point3;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::error::{require_positive, Error, Result};

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Rounded coordinate triple used as identity key.
type NodeKey = (i64, i64, i64);

/// Default merge tolerance for a fresh model (5 mm).
pub const DEFAULT_NODE_TOLERANCE: f64 = 0.005;

/// Stable node identifier. Ids are monotonic and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// An analytical node in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Node {
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn point(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Plan (XY) distance to another node.
    pub fn plan_distance(&self, other: &Node) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    pub fn distance(&self, other: &Node) -> f64 {
        (other.point() - self.point()).norm()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}: {:.3}, {:.3}, {:.3})", self.id.0, self.x, self.y, self.z)
    }
}

/// Axis-aligned bounds of a node set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl NodeBounds {
    fn at(node: &Node) -> Self {
        Self {
            min_x: node.x,
            min_y: node.y,
            min_z: node.z,
            max_x: node.x,
            max_y: node.y,
            max_z: node.z,
        }
    }

    fn expand(&mut self, node: &Node) {
        self.min_x = self.min_x.min(node.x);
        self.min_y = self.min_y.min(node.y);
        self.min_z = self.min_z.min(node.z);
        self.max_x = self.max_x.max(node.x);
        self.max_y = self.max_y.max(node.y);
        self.max_z = self.max_z.max(node.z);
    }
}

/// Old id → surviving id, produced by [`NodeStore::reindex`].
pub type NodeMapping = FxHashMap<NodeId, NodeId>;

/// Canonical 3D point registry with tolerance-based identity.
#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: FxIndexMap<NodeId, Node>,
    keys: FxHashMap<NodeKey, NodeId>,
    tolerance: f64,
    scale: f64,
    next_id: u32,
    stale: bool,
}

impl NodeStore {
    /// Creates an empty store. Fails if `tolerance` is not a finite positive number.
    pub fn new(tolerance: f64) -> Result<Self> {
        let tolerance = require_positive("node_tolerance", tolerance)?;
        Ok(Self {
            nodes: FxIndexMap::default(),
            keys: FxHashMap::default(),
            tolerance,
            scale: key_scale(tolerance),
            next_id: 1,
            stale: false,
        })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutable access to a node's coordinates.
    ///
    /// Moving a node invalidates the identity keys; call [`NodeStore::reindex`]
    /// before relying on `get_or_create` again.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let node = self.nodes.get_mut(&id)?;
        self.stale = true;
        Some(node)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Mutable iteration over every node. Marks the keys stale.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.stale = true;
        self.nodes.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// True when nodes were moved since the last reindex.
    pub fn needs_reindex(&self) -> bool {
        self.stale
    }

    /// Returns the node at `(x, y, z)` if one already rounds to the same key,
    /// otherwise registers a new node with a fresh id.
    pub fn get_or_create(&mut self, x: f64, y: f64, z: f64) -> Result<NodeId> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(Error::invalid_geometry(
                "node",
                format!("non-finite coordinate ({x}, {y}, {z})"),
            ));
        }
        let key = self.key(x, y, z)?;
        if let Some(&id) = self.keys.get(&key) {
            return Ok(id);
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node { id, x, y, z });
        self.keys.insert(key, id);
        Ok(id)
    }

    pub fn get_or_create_point(&mut self, p: &Point3<f64>) -> Result<NodeId> {
        self.get_or_create(p.x, p.y, p.z)
    }

    /// Rebuilds the key map from the current node positions, optionally under
    /// a new tolerance.
    ///
    /// Nodes whose keys now collide are merged into the first one met in
    /// insertion order. The returned mapping covers every node that existed
    /// before the call; survivors map to themselves.
    ///
    /// Fails without touching the store when a coordinate does not fit the
    /// key range at the requested tolerance.
    pub fn reindex(&mut self, tolerance: Option<f64>) -> Result<NodeMapping> {
        let (tolerance, scale) = match tolerance {
            Some(t) => {
                let t = require_positive("node_tolerance", t)?;
                (t, key_scale(t))
            }
            None => (self.tolerance, self.scale),
        };

        let mut keys: FxHashMap<NodeKey, NodeId> = FxHashMap::default();
        let mut mapping = NodeMapping::default();
        let mut merged: FxHashSet<NodeId> = FxHashSet::default();

        for node in self.nodes.values() {
            let key = node_key(node.x, node.y, node.z, scale, tolerance)?;
            match keys.get(&key) {
                Some(&survivor) => {
                    mapping.insert(node.id, survivor);
                    merged.insert(node.id);
                }
                None => {
                    keys.insert(key, node.id);
                    mapping.insert(node.id, node.id);
                }
            }
        }

        if !merged.is_empty() {
            self.nodes.retain(|id, _| !merged.contains(id));
        }
        self.tolerance = tolerance;
        self.scale = scale;
        self.keys = keys;
        self.stale = false;

        tracing::debug!(
            tolerance = self.tolerance,
            merged = merged.len(),
            remaining = self.nodes.len(),
            "Reindexed node store"
        );
        Ok(mapping)
    }

    /// Deletes a node. Freed ids are never handed out again.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&id)?;
        let key = self.key(node.x, node.y, node.z).ok();
        if let Some(key) = key.filter(|k| self.keys.get(k) == Some(&id)) {
            self.keys.remove(&key);
        } else {
            // node moved since its key was computed
            self.keys.retain(|_, v| *v != id);
        }
        Some(node)
    }

    /// Removes every node whose id is not in `keep`. Returns the number removed.
    pub fn retain_ids(&mut self, keep: &FxHashSet<NodeId>) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|id, _| keep.contains(id));
        self.keys.retain(|_, id| keep.contains(id));
        before - self.nodes.len()
    }

    /// Bounds of all nodes, `None` when the store is empty.
    pub fn bounds(&self) -> Option<NodeBounds> {
        let mut nodes = self.nodes.values();
        let mut bounds = NodeBounds::at(nodes.next()?);
        for n in nodes {
            bounds.expand(n);
        }
        Some(bounds)
    }

    #[inline]
    fn key(&self, x: f64, y: f64, z: f64) -> Result<NodeKey> {
        node_key(x, y, z, self.scale, self.tolerance)
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self {
            nodes: FxIndexMap::default(),
            keys: FxHashMap::default(),
            tolerance: DEFAULT_NODE_TOLERANCE,
            scale: key_scale(DEFAULT_NODE_TOLERANCE),
            next_id: 1,
            stale: false,
        }
    }
}

/// Number of decimal digits kept in identity keys: `-log10(tolerance)`,
/// rounded up unless it is already integral.
pub fn precision_digits(tolerance: f64) -> i32 {
    let digits = -tolerance.log10();
    if (digits - digits.round()).abs() < 1e-9 {
        digits.round() as i32
    } else {
        digits.ceil() as i32
    }
}

fn key_scale(tolerance: f64) -> f64 {
    10f64.powi(precision_digits(tolerance))
}

/// Rounds scaled coordinates to integers, refusing values the `i64` cast
/// would saturate.
fn node_key(x: f64, y: f64, z: f64, scale: f64, tolerance: f64) -> Result<NodeKey> {
    let component = |v: f64| {
        let scaled = (v * scale).round();
        if scaled.abs() < i64::MAX as f64 {
            Ok(scaled as i64)
        } else {
            Err(Error::invalid_parameter(
                "node_tolerance",
                format!("coordinate {v} is out of range for tolerance {tolerance}"),
            ))
        }
    };
    Ok((component(x)?, component(y)?, component(z)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        let mut store = NodeStore::new(0.001).unwrap();
        let a = store.get_or_create(1.0, 2.0, 3.0).unwrap();
        let b = store.get_or_create(1.0, 2.0, 3.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn points_within_tolerance_collide() {
        let mut store = NodeStore::new(0.001).unwrap();
        let a = store.get_or_create(1.0, 2.0, 3.0).unwrap();
        let b = store.get_or_create(1.0001, 2.0002, 2.9999).unwrap();
        let c = store.get_or_create(1.01, 2.0, 3.0).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn precision_from_tolerance() {
        assert_eq!(precision_digits(0.001), 3);
        assert_eq!(precision_digits(0.005), 3);
        assert_eq!(precision_digits(0.01), 2);
        assert_eq!(precision_digits(1.0), 0);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(NodeStore::new(0.0).is_err());
        assert!(NodeStore::new(-0.01).is_err());
        let mut store = NodeStore::new(0.001).unwrap();
        assert!(matches!(
            store.get_or_create(f64::NAN, 0.0, 0.0),
            Err(Error::InvalidGeometry { .. })
        ));
        assert!(store.get_or_create(0.0, f64::INFINITY, 0.0).is_err());
        assert!(store.reindex(Some(-1.0)).is_err());
    }

    #[test]
    fn reindex_merges_moved_nodes_keeping_first() {
        let mut store = NodeStore::new(0.001).unwrap();
        let a = store.get_or_create(0.0, 0.0, 0.0).unwrap();
        let b = store.get_or_create(1.0, 0.0, 0.0).unwrap();
        let c = store.get_or_create(2.0, 0.0, 0.0).unwrap();

        // move c onto a
        store.get_mut(c).unwrap().x = 0.0;
        assert!(store.needs_reindex());

        let mapping = store.reindex(None).unwrap();
        assert!(!store.needs_reindex());
        assert_eq!(store.len(), 2);
        assert_eq!(mapping[&a], a);
        assert_eq!(mapping[&b], b);
        assert_eq!(mapping[&c], a);
        assert!(!store.contains(c));

        // the merged key resolves to the survivor
        assert_eq!(store.get_or_create(0.0, 0.0, 0.0).unwrap(), a);
    }

    #[test]
    fn coarser_tolerance_never_adds_nodes() {
        let coords = [
            (0.0, 0.0, 0.0),
            (0.004, 0.0, 0.0),
            (0.012, 0.0, 0.0),
            (0.3, 0.2, 0.0),
            (0.31, 0.2, 0.0),
            (5.0, 5.0, 5.0),
        ];
        let mut store = NodeStore::new(0.0001).unwrap();
        for (x, y, z) in coords {
            store.get_or_create(x, y, z).unwrap();
        }
        let mut previous = store.len();
        for t in [0.001, 0.01, 0.1, 1.0] {
            store.reindex(Some(t)).unwrap();
            assert!(store.len() <= previous, "tolerance {t} increased node count");
            previous = store.len();
        }
        assert_eq!(store.tolerance(), 1.0);
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut store = NodeStore::new(0.001).unwrap();
        let a = store.get_or_create(0.0, 0.0, 0.0).unwrap();
        store.get_or_create(1.0, 0.0, 0.0).unwrap();
        assert!(store.remove(a).is_some());
        assert!(store.remove(a).is_none());

        let again = store.get_or_create(0.0, 0.0, 0.0).unwrap();
        assert_ne!(again, a);
        assert_eq!(again, NodeId(3));
    }

    #[test]
    fn retain_ids_drops_the_rest() {
        let mut store = NodeStore::new(0.001).unwrap();
        let a = store.get_or_create(0.0, 0.0, 0.0).unwrap();
        store.get_or_create(1.0, 0.0, 0.0).unwrap();
        store.get_or_create(2.0, 0.0, 0.0).unwrap();
        let keep: FxHashSet<NodeId> = [a].into_iter().collect();
        assert_eq!(store.retain_ids(&keep), 2);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn survey_coordinates_beyond_the_key_range_are_refused() {
        let mut store = NodeStore::new(1e-13).unwrap();
        let err = store.get_or_create(2_600_000.0, 1_200_000.0, 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "node_tolerance", .. }));
        assert!(store.is_empty());

        // a failed reindex keeps the old tolerance and nodes
        let mut store = NodeStore::new(0.001).unwrap();
        let a = store.get_or_create(2_600_000.0, 1_200_000.0, 0.0).unwrap();
        let b = store.get_or_create(2_600_010.0, 1_200_000.0, 0.0).unwrap();
        assert_ne!(a, b);
        assert!(store.reindex(Some(1e-13)).is_err());
        assert_eq!(store.tolerance(), 0.001);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_or_create(2_600_010.0, 1_200_000.0, 0.0).unwrap(), b);
    }

    #[test]
    fn bounds_cover_all_nodes() {
        let mut store = NodeStore::new(0.001).unwrap();
        assert!(store.bounds().is_none());
        store.get_or_create(-2.0, 3.0, 0.0).unwrap();
        store.get_or_create(4.0, 8.0, 3.0).unwrap();
        let b = store.bounds().unwrap();
        assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (-2.0, 3.0, 4.0, 8.0));
        assert_eq!((b.min_z, b.max_z), (0.0, 3.0));
    }
}
