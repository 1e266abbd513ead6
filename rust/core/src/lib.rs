// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # StrucNorm Core
//!
//! Analytical structural model used by the normalization pipeline.
//!
//! ## Overview
//!
//! - **Node Store**: tolerance-keyed node identity with deterministic merging
//!   ([`NodeStore`])
//! - **Elements**: frames, wall panels and slab panels as a closed sum type
//!   referencing nodes by id ([`StructuralElement`])
//! - **Grids**: Hesse-normal-form grid lines grouped into named systems
//!   ([`GridSystem`], [`GridRegistry`])
//! - **Stories**, **configuration** and a **diagnostics** sink shared by
//!   every stage
//!
//! ## Quick Start
//!
//! ```rust
//! use strucnorm_core::{ElementProps, FrameRole, Model};
//!
//! let mut model = Model::new("Demo");
//! model
//!     .add_frame(
//!         ElementProps::new("B1", "V30x60", "G30", "L1"),
//!         FrameRole::Beam,
//!         [0.0, 0.0, 3.0],
//!         [6.0, 0.0, 3.0],
//!     )
//!     .unwrap();
//!
//! let beam = &model.elements[0];
//! assert_eq!(beam.angle(&model.nodes), Some(0.0));
//! ```

pub mod angle;
pub mod config;
pub mod diagnostics;
pub mod element;
pub mod error;
pub mod grid;
pub mod model;
pub mod node;
pub mod story;

pub use config::{GridConfig, NormalizeConfig, Shift, TransformConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, Stage};
pub use element::{ElementId, ElementKind, ElementProps, ElementType, FrameRole, StructuralElement};
pub use error::{Error, Result};
pub use grid::{BoundingBox2, GridLine, GridRegistry, GridSummary, GridSystem};
pub use model::{Model, ModelSummary, ShellInput, ShellKind};
pub use node::{Node, NodeBounds, NodeId, NodeMapping, NodeStore, DEFAULT_NODE_TOLERANCE};
pub use story::{Story, StoryManager};
