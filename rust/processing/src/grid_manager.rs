// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Assembly of named grid systems from a master grid.

use serde::Serialize;
use strucnorm_core::angle::{angular_distance, normal_angle};
use strucnorm_core::{Diagnostics, Error, GridSystem, Model, Stage};

use crate::grid_factory::{MasterGrid, RhoBucket};

/// Maximum deviation from 90° for two orientations to share a system.
pub const ORTHOGONAL_TOLERANCE_DEG: f64 = 1.0;

/// Statistics from [`organize_grids`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GridReport {
    pub systems: usize,
    pub lines: usize,
    pub duplicates: usize,
}

/// Prefix of the `n`-th system (1-based): `A`..`Z`, then `S27`, `S28`, ...
pub fn system_prefix(n: usize) -> String {
    if (1..=26).contains(&n) {
        char::from(b'A' + (n - 1) as u8).to_string()
    } else {
        format!("S{n}")
    }
}

/// Letter-axis label of the `index`-th line (0-based): `A`..`Z`, then `Z1`, `Z2`, ...
pub fn letter_label(index: usize) -> String {
    if index < 26 {
        char::from(b'A' + index as u8).to_string()
    } else {
        format!("Z{}", index - 25)
    }
}

/// Number-axis label of the `index`-th line (0-based): `1`, `2`, ...
pub fn number_label(index: usize) -> String {
    (index + 1).to_string()
}

/// Offsets in labelling order: bottom to top for lines running roughly
/// along X, left to right for lines running roughly along Y.
///
/// For near-vertical lines whose normal points towards -X this reverses the
/// ascending rho order.
fn labelling_order(bucket: &RhoBucket) -> Vec<f64> {
    let theta = normal_angle(bucket.angle).to_radians();
    let (c, s) = (theta.cos(), theta.sin());
    let mut rhos = bucket.rhos.clone();
    rhos.sort_by(f64::total_cmp);
    if c.abs() > s.abs() && c < 0.0 {
        rhos.reverse();
    }
    rhos
}

/// Replaces the model's grid systems with systems built from `grid`.
///
/// Orientations are walked by ascending angle. Each unused orientation opens
/// a system `G<n>` and takes the letter axis; an unused orientation within
/// 1° of perpendicular becomes its number axis. Line labels are
/// `{prefix}-{axis label}`. Duplicate lines are skipped with a warning.
pub fn organize_grids(model: &mut Model, grid: &MasterGrid, diags: &mut Diagnostics) -> GridReport {
    model.grids.clear();
    let mut report = GridReport::default();
    let buckets = &grid.buckets;
    let mut used = vec![false; buckets.len()];

    for i in 0..buckets.len() {
        if used[i] {
            continue;
        }
        used[i] = true;

        let target = buckets[i].angle + 90.0;
        let partner = (0..buckets.len())
            .filter(|&j| !used[j])
            .map(|j| (j, angular_distance(buckets[j].angle, target)))
            .filter(|&(_, d)| d < ORTHOGONAL_TOLERANCE_DEG)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(j, _)| j);

        let n = report.systems + 1;
        let mut system = GridSystem::new(format!("G{n}"), system_prefix(n));
        add_axis(&mut system, &buckets[i], letter_label, &mut report, diags);
        if let Some(j) = partner {
            used[j] = true;
            add_axis(&mut system, &buckets[j], number_label, &mut report, diags);
        }

        match model.grids.add_system(system) {
            Ok(system) => {
                tracing::debug!(system = %system.name, lines = system.lines.len(), "Grid system created");
                report.systems += 1;
            }
            Err(err) => diags.warn(Stage::GridManager, None, err.to_string()),
        }
    }

    diags.info(
        Stage::GridManager,
        format!("{} grid systems with {} lines", report.systems, report.lines),
    );
    tracing::info!(systems = report.systems, lines = report.lines, "Grid systems organized");
    report
}

fn add_axis(
    system: &mut GridSystem,
    bucket: &RhoBucket,
    label: fn(usize) -> String,
    report: &mut GridReport,
    diags: &mut Diagnostics,
) {
    for (index, rho) in labelling_order(bucket).into_iter().enumerate() {
        if system.contains_line(bucket.angle, rho) {
            report.duplicates += 1;
            continue;
        }
        let full_label = format!("{}-{}", system.prefix, label(index));
        match system.add_line(full_label, bucket.angle, rho) {
            Ok(_) => report.lines += 1,
            Err(err @ Error::DuplicateEntity { .. }) => {
                report.duplicates += 1;
                diags.warn(Stage::GridManager, None, err.to_string());
            }
            Err(err) => diags.warn(Stage::GridManager, None, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(angle: f64, rhos: &[f64]) -> RhoBucket {
        RhoBucket {
            angle,
            rhos: rhos.to_vec(),
        }
    }

    #[test]
    fn labels() {
        assert_eq!(system_prefix(1), "A");
        assert_eq!(system_prefix(26), "Z");
        assert_eq!(system_prefix(27), "S27");
        assert_eq!(letter_label(0), "A");
        assert_eq!(letter_label(25), "Z");
        assert_eq!(letter_label(26), "Z1");
        assert_eq!(letter_label(27), "Z2");
        assert_eq!(number_label(0), "1");
    }

    #[test]
    fn orthogonal_pair_forms_one_system() {
        let mut model = Model::new("t");
        let mut diags = Diagnostics::new();
        let grid = MasterGrid {
            buckets: vec![bucket(0.0, &[5.0, 0.0]), bucket(90.0, &[0.0, 6.0, 12.0])],
        };

        let report = organize_grids(&mut model, &grid, &mut diags);
        assert_eq!(report.systems, 1);
        assert_eq!(report.lines, 5);

        let system = model.grids.system("G1").unwrap();
        assert_eq!(system.prefix, "A");
        assert_eq!(system.line("A-A").unwrap().rho, 0.0);
        assert_eq!(system.line("A-B").unwrap().rho, 5.0);
        assert_eq!(system.line("A-3").unwrap().rho, 12.0);
        assert_eq!(system.line("A-3").unwrap().angle_deg, 90.0);
    }

    #[test]
    fn skewed_orientation_gets_its_own_system() {
        let mut model = Model::new("t");
        let mut diags = Diagnostics::new();
        let grid = MasterGrid {
            buckets: vec![
                bucket(0.0, &[0.0]),
                bucket(30.0, &[1.0]),
                bucket(90.0, &[0.0]),
                bucket(120.0, &[2.0]),
            ],
        };

        let report = organize_grids(&mut model, &grid, &mut diags);
        assert_eq!(report.systems, 2);
        let g2 = model.grids.system("G2").unwrap();
        assert_eq!(g2.prefix, "B");
        assert!(g2.line("B-A").is_some_and(|l| l.angle_deg == 30.0));
        assert!(g2.line("B-1").is_some_and(|l| l.angle_deg == 120.0));
    }

    #[test]
    fn near_vertical_lines_label_left_to_right() {
        // at 80° the normal points towards -X, so larger rho means further left
        let order = labelling_order(&bucket(80.0, &[-1.0, -5.0, -3.0]));
        assert_eq!(order, vec![-1.0, -3.0, -5.0]);
        let order = labelling_order(&bucket(90.0, &[4.0, 1.0]));
        assert_eq!(order, vec![1.0, 4.0]);
    }

    #[test]
    fn rebuilding_replaces_previous_systems() {
        let mut model = Model::new("t");
        let mut diags = Diagnostics::new();
        let grid = MasterGrid {
            buckets: vec![bucket(0.0, &[0.0])],
        };
        organize_grids(&mut model, &grid, &mut diags);
        organize_grids(&mut model, &grid, &mut diags);
        assert_eq!(model.grids.systems().len(), 1);
    }
}
