// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building stories (levels).

use crate::diagnostics::{Diagnostics, Stage};
use crate::error::{Error, Result};

/// Tolerance for looking a story up by elevation (1 mm).
const ELEVATION_LOOKUP_TOLERANCE: f64 = 0.001;

/// Elevations closer than this are considered the same story.
const ELEVATION_DUPLICATE_TOLERANCE: f64 = 1e-6;

/// A building level at a normalized elevation in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub name: String,
    pub elevation: f64,
    pub id: String,
}

/// Stories kept sorted by elevation.
#[derive(Debug, Clone, Default)]
pub struct StoryManager {
    stories: Vec<Story>,
}

impl StoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a story. A name, id or elevation collision is rejected with
    /// [`Error::DuplicateEntity`], reported as a warning, and the existing
    /// story is kept.
    pub fn add_story(
        &mut self,
        name: impl Into<String>,
        elevation: f64,
        id: impl Into<String>,
        diags: &mut Diagnostics,
    ) -> Result<&Story> {
        let (name, id) = (name.into(), id.into());
        if !elevation.is_finite() {
            return Err(Error::invalid_parameter(
                "elevation",
                format!("story {name} has non-finite elevation"),
            ));
        }
        if self.stories.iter().any(|s| {
            s.name == name
                || s.id == id
                || (s.elevation - elevation).abs() < ELEVATION_DUPLICATE_TOLERANCE
        }) {
            let err = Error::DuplicateEntity {
                kind: "story",
                name,
            };
            diags.warn(Stage::Model, Some(id.as_str()), format!("{err} at elevation {elevation}; skipped"));
            return Err(err);
        }

        self.stories.push(Story {
            name,
            elevation,
            id: id.clone(),
        });
        self.stories
            .sort_by(|a, b| a.elevation.total_cmp(&b.elevation));
        // just inserted, so the lookup cannot fail
        let idx = self.stories.iter().position(|s| s.id == id).unwrap_or(0);
        Ok(&self.stories[idx])
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    /// Inter-story height relative to the story below. The lowest story
    /// returns its own elevation; unknown ids return 0.
    pub fn story_height(&self, id: &str) -> f64 {
        match self.stories.iter().position(|s| s.id == id) {
            Some(0) => self.stories[0].elevation,
            Some(i) => self.stories[i].elevation - self.stories[i - 1].elevation,
            None => 0.0,
        }
    }

    /// Elevation of the highest story.
    pub fn total_height(&self) -> f64 {
        self.stories.last().map_or(0.0, |s| s.elevation)
    }

    /// Story at `elevation`, within 1 mm.
    pub fn story_by_elevation(&self, elevation: f64) -> Option<&Story> {
        self.stories
            .iter()
            .find(|s| (s.elevation - elevation).abs() < ELEVATION_LOOKUP_TOLERANCE)
    }
}
