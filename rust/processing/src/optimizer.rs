// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model-level geometric cleanup.
//!
//! Stages, in the order the pipeline runs them:
//! 1. Short-element pruning
//! 2. Orphan-node pruning
//! 3. Optional rigid transform (translate, then rotate)
//! 4. Optional pre-snap reindex at a coarser tolerance
//! 5. Angle clustering and fixing
//!
//! Every stage that moves nodes reindexes the store before returning.

use nalgebra::{Point2, Rotation2};
use serde::Serialize;
use strucnorm_core::angle::{plan_angle, shortest_rotation};
use strucnorm_core::error::{require_non_negative, require_positive};
use strucnorm_core::{
    Diagnostics, ElementKind, Error, Model, NodeId, NodeMapping, NormalizeConfig, Result, Shift,
    Stage,
};

use crate::cluster::cluster_angles;

/// Rotations smaller than this (degrees) are skipped.
const MIN_ROTATION_DEG: f64 = 1e-12;

/// Offsets and rotation actually applied by [`transform_model`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AppliedTransform {
    pub dx: f64,
    pub dy: f64,
    pub alpha_deg: f64,
    pub merged_nodes: usize,
}

/// Statistics from the optimizer stages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptimizeReport {
    pub removed_short: usize,
    pub removed_orphans: usize,
    pub transform: Option<AppliedTransform>,
    pub pre_snap_merged: usize,
    pub angle_clusters: usize,
    pub rotated_elements: usize,
    pub merged_after_rotation: usize,
}

/// Runs every optimizer stage configured in `config`.
pub fn optimize(model: &mut Model, config: &NormalizeConfig, diags: &mut Diagnostics) -> Result<OptimizeReport> {
    config.validate()?;
    let mut report = OptimizeReport {
        removed_short: remove_short_elements(model, config.min_length, diags)?,
        removed_orphans: remove_orphan_nodes(model, diags),
        ..Default::default()
    };

    if let Some(t) = &config.transform {
        report.transform = Some(transform_model(model, t.dx, t.dy, t.alpha_deg, diags)?);
    }

    if let Some(tolerance) = config.pre_snap_tolerance {
        let before = model.nodes.len();
        pre_snap_nodes(model, tolerance, diags)?;
        report.pre_snap_merged = before - model.nodes.len();
    }

    if config.fix_angles {
        let fix = cluster_and_fix_angles(model, config.angle_eps_deg, diags)?;
        report.angle_clusters = fix.clusters;
        report.rotated_elements = fix.rotated;
        report.merged_after_rotation = fix.merged_nodes;
    }

    tracing::info!(
        removed_short = report.removed_short,
        removed_orphans = report.removed_orphans,
        rotated = report.rotated_elements,
        nodes = model.nodes.len(),
        "Geometry optimization complete"
    );
    Ok(report)
}

// ─── Pruning ────────────────────────────────────────────────────────────────

/// Drops frames and wall panels shorter than `min_length`.
///
/// Frames are measured end to end, walls along their base edge. Slabs are
/// never pruned and nodes are left in place. Returns the number removed.
pub fn remove_short_elements(model: &mut Model, min_length: f64, diags: &mut Diagnostics) -> Result<usize> {
    let min_length = require_non_negative("min_length", min_length)?;
    let before = model.elements.len();

    let nodes = &model.nodes;
    model.elements.retain(|element| match element.characteristic_length(nodes) {
        Some(length) if length < min_length => {
            tracing::debug!(element = %element.external_id(), length, "Removing short element");
            false
        }
        _ => true,
    });

    let removed = before - model.elements.len();
    if removed > 0 {
        diags.info(
            Stage::Optimize,
            format!("removed {removed} elements shorter than {min_length} m"),
        );
    }
    Ok(removed)
}

/// Deletes every node no element references. Returns the number removed.
pub fn remove_orphan_nodes(model: &mut Model, diags: &mut Diagnostics) -> usize {
    let referenced = model.referenced_node_ids();
    let removed = model.nodes.retain_ids(&referenced);
    if removed > 0 {
        diags.info(Stage::Optimize, format!("removed {removed} orphan nodes"));
    }
    removed
}

// ─── Rigid Transform ────────────────────────────────────────────────────────

/// Translates every node by `(dx, dy)` and then rotates it by `alpha_deg`
/// about the new origin.
///
/// [`Shift::Auto`] moves the minimum coordinate to zero; it is resolved from
/// the node positions before any rotation. Grid systems follow the same
/// transform. The node store is reindexed afterwards.
pub fn transform_model(
    model: &mut Model,
    dx: Shift,
    dy: Shift,
    alpha_deg: f64,
    diags: &mut Diagnostics,
) -> Result<AppliedTransform> {
    if !alpha_deg.is_finite() {
        return Err(Error::invalid_parameter("alpha_deg", "must be finite"));
    }
    let bounds = model.nodes.bounds();
    let resolve = |shift: Shift, name: &'static str, min: Option<f64>| -> Result<f64> {
        match shift {
            Shift::Auto => Ok(min.map_or(0.0, |m| -m)),
            Shift::Value(v) if v.is_finite() => Ok(v),
            Shift::Value(_) => Err(Error::invalid_parameter(name, "must be finite or \"auto\"")),
        }
    };
    let dx = resolve(dx, "dx", bounds.as_ref().map(|b| b.min_x))?;
    let dy = resolve(dy, "dy", bounds.as_ref().map(|b| b.min_y))?;

    let rotation = Rotation2::new(alpha_deg.to_radians());
    for node in model.nodes.iter_mut() {
        let p = rotation * Point2::new(node.x + dx, node.y + dy);
        node.x = p.x;
        node.y = p.y;
    }
    model.grids.apply_transform(dx, dy, alpha_deg);

    let before = model.nodes.len();
    model.reindex(None, diags)?;
    let merged_nodes = before - model.nodes.len();

    diags.info(
        Stage::Optimize,
        format!("transformed model by dx={dx:.4}, dy={dy:.4}, alpha={alpha_deg}°"),
    );
    tracing::info!(dx, dy, alpha_deg, merged_nodes, "Applied rigid transform");
    Ok(AppliedTransform {
        dx,
        dy,
        alpha_deg,
        merged_nodes,
    })
}

/// Coalesces near-duplicate nodes by reindexing at `tolerance`.
pub fn pre_snap_nodes(model: &mut Model, tolerance: f64, diags: &mut Diagnostics) -> Result<NodeMapping> {
    model.reindex(Some(tolerance), diags)
}

// ─── Angle Fixing ───────────────────────────────────────────────────────────

/// Outcome of [`cluster_and_fix_angles`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AngleFix {
    pub clusters: usize,
    pub rotated: usize,
    pub merged_nodes: usize,
}

/// Snaps near-duplicate orientations onto their cluster median.
///
/// Each frame or wall is rotated in plan about its leading node (frame
/// start, first wall node) until its angle equals the median of its cluster.
/// Only the other nodes move, so a node shared with a neighbouring element
/// drags that element along; the closing reindex merges nodes that end up
/// coincident.
pub fn cluster_and_fix_angles(model: &mut Model, eps_deg: f64, diags: &mut Diagnostics) -> Result<AngleFix> {
    let eps_deg = require_positive("eps_deg", eps_deg)?;

    let (indices, angles): (Vec<usize>, Vec<f64>) = model
        .elements
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.angle(&model.nodes).map(|a| (i, a)))
        .unzip();
    let clusters = cluster_angles(&angles, eps_deg);

    let mut fix = AngleFix {
        clusters: clusters.len(),
        ..Default::default()
    };
    for cluster in &clusters {
        for &member in &cluster.members {
            if rotate_element_to(model, indices[member], cluster.median) {
                fix.rotated += 1;
            }
        }
    }

    let before = model.nodes.len();
    model.reindex(None, diags)?;
    fix.merged_nodes = before - model.nodes.len();

    diags.info(
        Stage::Optimize,
        format!(
            "{} angle clusters, {} elements rotated, {} nodes merged",
            fix.clusters, fix.rotated, fix.merged_nodes
        ),
    );
    tracing::info!(
        clusters = fix.clusters,
        rotated = fix.rotated,
        merged = fix.merged_nodes,
        "Angle fixing complete"
    );
    Ok(fix)
}

/// Rotates one element so its current plan angle becomes `target`.
fn rotate_element_to(model: &mut Model, index: usize, target: f64) -> bool {
    let Some(element) = model.elements.get(index) else {
        return false;
    };
    let (Some(lead), Some((_, b))) = (element.leading_node(), element.plan_axis(&model.nodes)) else {
        return false;
    };
    let (Some(pivot), Some(tip)) = (model.nodes.get(lead), model.nodes.get(b)) else {
        return false;
    };
    // recomputed here since earlier rotations may have moved shared nodes
    let current = plan_angle(tip.x - pivot.x, tip.y - pivot.y);
    let delta = shortest_rotation(current, target);
    if delta.abs() < MIN_ROTATION_DEG {
        return false;
    }

    let centre = Point2::new(pivot.x, pivot.y);
    let rotation = Rotation2::new(delta.to_radians());
    let moving: Vec<NodeId> = match &element.kind {
        ElementKind::Frame { end, .. } => vec![*end],
        ElementKind::Wall { nodes } => nodes.iter().skip(1).copied().filter(|&n| n != lead).collect(),
        ElementKind::Slab { .. } => return false,
    };

    for id in moving {
        if let Some(node) = model.nodes.get_mut(id) {
            let p = centre + rotation * (Point2::new(node.x, node.y) - centre);
            node.x = p.x;
            node.y = p.y;
        }
    }
    true
}
