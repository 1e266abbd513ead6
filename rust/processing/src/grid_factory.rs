// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Master grid inference and node snapping.
//!
//! Dominant orientations are found by clustering element angles. Every
//! element then votes one longitudinal offset at its own master angle and
//! two transverse offsets at the perpendicular angle. The offsets of each
//! angle are clustered into grid lines, and finally nodes close enough to
//! two grid lines are moved onto their intersection.

use serde::Serialize;
use smallvec::SmallVec;
use strucnorm_core::angle::{angular_distance, hesse_rho, intersect_hesse, normalize_angle, round_to};
use strucnorm_core::error::require_non_negative;
use strucnorm_core::{Diagnostics, GridConfig, Model, NodeId, Result, Stage};

use crate::cluster::{cluster_angles, cluster_medians};

/// Two master angles closer than this (degrees) are the same bucket.
pub const ANGLE_KEY_TOLERANCE: f64 = 1e-6;

/// Grid line offsets consolidated for one orientation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RhoBucket {
    pub angle: f64,
    /// Ascending, rounded, unique.
    pub rhos: Vec<f64>,
}

/// Orientation → grid line offsets, ordered by ascending angle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MasterGrid {
    pub buckets: Vec<RhoBucket>,
}

impl MasterGrid {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn angles(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.angle).collect()
    }

    pub fn bucket(&self, angle: f64) -> Option<&RhoBucket> {
        self.buckets
            .iter()
            .find(|b| angular_distance(b.angle, angle) < ANGLE_KEY_TOLERANCE)
    }

    pub fn line_count(&self) -> usize {
        self.buckets.iter().map(|b| b.rhos.len()).sum()
    }
}

/// Dominant orientations of the model's frames and walls, ascending.
///
/// Cluster medians within `snap_threshold` of a canonical angle are
/// replaced by the nearest canonical angle.
pub fn find_master_angles(model: &Model, config: &GridConfig) -> Result<Vec<f64>> {
    config.validate()?;
    let angles: Vec<f64> = model
        .elements
        .iter()
        .filter_map(|e| e.angle(&model.nodes))
        .collect();

    let mut masters: Vec<f64> = Vec::new();
    for cluster in cluster_angles(&angles, config.eps_deg) {
        let master = snap_to_canonical(cluster.median, &config.canonical_angles, config.snap_threshold);
        if !masters
            .iter()
            .any(|&m| angular_distance(m, master) < ANGLE_KEY_TOLERANCE)
        {
            masters.push(master);
        }
    }
    masters.sort_by(f64::total_cmp);

    tracing::debug!(raw = angles.len(), masters = ?masters, "Master angles detected");
    Ok(masters)
}

fn snap_to_canonical(angle: f64, canonical: &[f64], threshold: f64) -> f64 {
    canonical
        .iter()
        .map(|&c| (angular_distance(angle, c), normalize_angle(c)))
        .filter(|&(d, _)| d <= threshold)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map_or(angle, |(_, c)| c)
}

/// Index of the bucket for `angle`, created on first use.
fn bucket_for(buckets: &mut Vec<(f64, Vec<f64>)>, angle: f64) -> usize {
    match buckets
        .iter()
        .position(|(a, _)| angular_distance(*a, angle) < ANGLE_KEY_TOLERANCE)
    {
        Some(i) => i,
        None => {
            buckets.push((angle, Vec::new()));
            buckets.len() - 1
        }
    }
}

/// `(master + 90) mod 180`.
fn perpendicular(master: f64) -> f64 {
    normalize_angle(master + 90.0)
}

/// Raw offsets per orientation before consolidation.
fn collect_rho_candidates(model: &Model, masters: &[f64]) -> Vec<(f64, Vec<f64>)> {
    let mut buckets: Vec<(f64, Vec<f64>)> = Vec::new();
    for &m in masters {
        bucket_for(&mut buckets, m);
        bucket_for(&mut buckets, perpendicular(m));
    }

    for element in &model.elements {
        let Some(angle) = element.angle(&model.nodes) else {
            continue;
        };
        let Some((a, b)) = element.plan_axis(&model.nodes) else {
            continue;
        };
        let (Some(p1), Some(p2)) = (model.nodes.get(a), model.nodes.get(b)) else {
            continue;
        };
        let Some(m) = masters
            .iter()
            .copied()
            .min_by(|x, y| angular_distance(*x, angle).total_cmp(&angular_distance(*y, angle)))
        else {
            continue;
        };
        let p = perpendicular(m);

        let longitudinal = bucket_for(&mut buckets, m);
        buckets[longitudinal].1.push(hesse_rho(p1.x, p1.y, m));
        let transverse = bucket_for(&mut buckets, p);
        buckets[transverse].1.push(hesse_rho(p1.x, p1.y, p));
        buckets[transverse].1.push(hesse_rho(p2.x, p2.y, p));
    }
    buckets
}

/// Clusters, rounds and sorts the offsets of one orientation.
fn consolidate_rhos(rhos: &[f64], eps_dist: f64, round_decimal: u32) -> Vec<f64> {
    let mut lines: Vec<f64> = cluster_medians(rhos, eps_dist)
        .into_iter()
        .map(|r| round_to(r, round_decimal))
        .collect();
    lines.sort_by(f64::total_cmp);
    lines.dedup();
    lines
}

/// Infers the master grid of the model.
///
/// Angles with no offset candidates are left out.
pub fn generate_master_grid(model: &Model, config: &GridConfig, diags: &mut Diagnostics) -> Result<MasterGrid> {
    let masters = find_master_angles(model, config)?;
    if masters.is_empty() {
        diags.warn(Stage::GridFactory, None, "no frame or wall orientations; grid is empty");
        return Ok(MasterGrid::default());
    }

    let mut buckets: Vec<RhoBucket> = collect_rho_candidates(model, &masters)
        .into_iter()
        .filter(|(_, rhos)| !rhos.is_empty())
        .map(|(angle, rhos)| RhoBucket {
            angle,
            rhos: consolidate_rhos(&rhos, config.eps_dist, config.round_decimal),
        })
        .collect();
    buckets.sort_by(|a, b| a.angle.total_cmp(&b.angle));

    let grid = MasterGrid { buckets };
    diags.info(
        Stage::GridFactory,
        format!(
            "{} master angles, {} orientations, {} grid lines",
            masters.len(),
            grid.buckets.len(),
            grid.line_count()
        ),
    );
    tracing::info!(
        masters = masters.len(),
        lines = grid.line_count(),
        "Master grid generated"
    );
    Ok(grid)
}

// ─── Node Snapping ──────────────────────────────────────────────────────────

/// Statistics from [`snap_nodes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapReport {
    /// Nodes relocated onto a grid intersection.
    pub moved: usize,
    /// Nodes whose two closest grid lines were parallel.
    pub singular: usize,
    /// Nodes close to fewer than two grid lines.
    pub unmatched: usize,
    /// Nodes merged by the closing reindex.
    pub merged: usize,
}

#[derive(Debug, Clone, Copy)]
struct GridHit {
    angle: f64,
    rho: f64,
    residual: f64,
}

/// Grid lines within `max_distance` of `(x, y)`, at most one per orientation.
fn grid_hits(grid: &MasterGrid, x: f64, y: f64, max_distance: f64) -> SmallVec<[GridHit; 4]> {
    let mut hits = SmallVec::new();
    for bucket in &grid.buckets {
        let rho = hesse_rho(x, y, bucket.angle);
        let nearest = bucket
            .rhos
            .iter()
            .map(|&r| (r, (r - rho).abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((line, residual)) = nearest {
            if residual <= max_distance {
                hits.push(GridHit {
                    angle: bucket.angle,
                    rho: line,
                    residual,
                });
            }
        }
    }
    hits
}

/// Moves every node claimed by two or more grid lines onto the intersection
/// of its two closest lines, then reindexes the store.
///
/// Parallel candidates leave the node where it is.
pub fn snap_nodes(
    model: &mut Model,
    grid: &MasterGrid,
    max_distance: f64,
    diags: &mut Diagnostics,
) -> Result<SnapReport> {
    let max_distance = require_non_negative("max_distance", max_distance)?;
    let mut report = SnapReport::default();

    let ids: Vec<NodeId> = model.nodes.ids().collect();
    for id in ids {
        let Some(node) = model.nodes.get(id) else {
            continue;
        };
        let mut hits = grid_hits(grid, node.x, node.y, max_distance);
        if hits.len() < 2 {
            report.unmatched += 1;
            continue;
        }
        hits.sort_by(|a, b| a.residual.total_cmp(&b.residual));

        let (h1, h2) = (hits[0], hits[1]);
        match intersect_hesse(h1.angle, h1.rho, h2.angle, h2.rho) {
            Some(p) => {
                if let Some(node) = model.nodes.get_mut(id) {
                    node.x = p.x;
                    node.y = p.y;
                    report.moved += 1;
                }
            }
            None => {
                report.singular += 1;
                tracing::debug!(node = %id, "Parallel grid candidates; node left in place");
            }
        }
    }

    let before = model.nodes.len();
    model.reindex(None, diags)?;
    report.merged = before - model.nodes.len();

    diags.info(
        Stage::Snap,
        format!(
            "snapped {} nodes ({} singular, {} unmatched, {} merged)",
            report.moved, report.singular, report.unmatched, report.merged
        ),
    );
    tracing::info!(
        moved = report.moved,
        singular = report.singular,
        unmatched = report.unmatched,
        merged = report.merged,
        "Node snapping complete"
    );
    Ok(report)
}
