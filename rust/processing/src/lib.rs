// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! StrucNorm Processing
//!
//! Model-level stages of the normalization pipeline: geometric cleanup,
//! master grid inference, grid system assembly and node snapping, plus the
//! [`Normalizer`] that runs them in order.
//!
//! ```rust
//! use strucnorm_core::{ElementProps, FrameRole, Model, NormalizeConfig};
//! use strucnorm_processing::normalize;
//!
//! let mut model = Model::new("Demo");
//! for (id, p1, p2) in [
//!     ("B1", [0.0, 0.0, 3.0], [6.0, 0.02, 3.0]),
//!     ("B2", [6.0, 0.02, 3.0], [6.0, 5.0, 3.0]),
//! ] {
//!     model
//!         .add_frame(ElementProps::new(id, "V30x60", "G30", "L1"), FrameRole::Beam, p1, p2)
//!         .unwrap();
//! }
//!
//! let mut config = NormalizeConfig::default();
//! config.grid.canonical_angles = vec![0.0, 90.0];
//! let (model, diagnostics, report) = normalize(model, config).unwrap();
//! assert_eq!(report.grid.unwrap().systems, 1);
//! assert!(!diagnostics.is_empty());
//! assert_eq!(model.summary().beams, 2);
//! ```

pub mod cluster;
pub mod grid_factory;
pub mod grid_manager;
pub mod optimizer;
pub mod pipeline;

pub use cluster::{cluster_1d, cluster_angles, cluster_indices, cluster_medians, AngleCluster};
pub use grid_factory::{
    find_master_angles, generate_master_grid, snap_nodes, MasterGrid, RhoBucket, SnapReport,
};
pub use grid_manager::{organize_grids, GridReport};
pub use optimizer::{
    cluster_and_fix_angles, optimize, pre_snap_nodes, remove_orphan_nodes, remove_short_elements,
    transform_model, AngleFix, AppliedTransform, OptimizeReport,
};
pub use pipeline::{normalize, NormalizeReport, Normalizer, PipelineState};
