// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! StrucNorm Geometry
//!
//! Decomposition of planar walls and slabs with openings into rectangular
//! analysis elements, using i_overlay for strip clipping and nalgebra for
//! the local plane frames.

pub mod bool2d;
pub mod decompose;
pub mod local_frame;
pub mod processors;
pub mod ring;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use bool2d::{intersect_box, Polygon2D};
pub use decompose::{decompose, Decomposition, Rect2};
pub use local_frame::{LocalFrame, PlaneOrientation, COPLANAR_TOLERANCE};
pub use processors::{
    DecomposeReport, ShellContext, ShellProcessor, ShellRouter, SlabProcessor, WallProcessor,
    SPANDREL_ASPECT_RATIO,
};
pub use ring::{check_openings, open_ring, validate_ring, RingDefect};
