// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the analytical model.

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or normalizing a model.
///
/// Geometry errors are element-scoped: batch stages catch them, record a
/// warning diagnostic and skip the offending element.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed ring, non-coplanar slab, degenerate direction vector or
    /// non-finite coordinate.
    #[error("invalid geometry for element {element}: {reason}")]
    InvalidGeometry { element: String, reason: String },

    /// A story, grid line or grid system with the same identity already exists.
    #[error("duplicate {kind}: {name}")]
    DuplicateEntity { kind: &'static str, name: String },

    /// A caller-supplied tolerance or parameter is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A pipeline stage was invoked out of order.
    #[error("pipeline stage out of order: expected {expected}, found {found}")]
    StageOrder {
        expected: &'static str,
        found: &'static str,
    },

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_geometry(element: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidGeometry {
            element: element.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Fails with [`Error::InvalidParameter`] unless `value` is finite and strictly positive.
pub fn require_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::invalid_parameter(
            name,
            format!("must be a finite positive number, got {value}"),
        ))
    }
}

/// Fails with [`Error::InvalidParameter`] unless `value` is finite and not negative.
pub fn require_non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::invalid_parameter(
            name,
            format!("must be a finite non-negative number, got {value}"),
        ))
    }
}
