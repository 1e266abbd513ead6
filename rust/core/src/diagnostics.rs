// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structured diagnostics collected while normalizing a model.
//!
//! Every stage receives a `&mut Diagnostics` and pushes records into it in
//! addition to emitting `tracing` events, so callers (and tests) can inspect
//! what was skipped or repaired without scraping logs.

use serde::Serialize;
use std::fmt;

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Model,
    NodeStore,
    Decompose,
    Optimize,
    GridFactory,
    GridManager,
    Snap,
    Pipeline,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Model => "model",
            Stage::NodeStore => "node-store",
            Stage::Decompose => "decompose",
            Stage::Optimize => "optimize",
            Stage::GridFactory => "grid-factory",
            Stage::GridManager => "grid-manager",
            Stage::Snap => "snap",
            Stage::Pipeline => "pipeline",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    /// External id of the element concerned, if any.
    pub element_id: Option<String>,
    pub message: String,
}

/// Collector for diagnostics emitted by the pipeline stages.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(stage = %stage, "{}", message);
        self.records.push(Diagnostic {
            severity: Severity::Info,
            stage,
            element_id: None,
            message,
        });
    }

    pub fn warn(&mut self, stage: Stage, element_id: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage = %stage, element = element_id.unwrap_or("-"), "{}", message);
        self.records.push(Diagnostic {
            severity: Severity::Warning,
            stage,
            element_id: element_id.map(str::to_owned),
            message,
        });
    }

    pub fn error(&mut self, stage: Stage, element_id: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(stage = %stage, element = element_id.unwrap_or("-"), "{}", message);
        self.records.push(Diagnostic {
            severity: Severity::Error,
            stage,
            element_id: element_id.map(str::to_owned),
            message,
        });
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Records produced by one stage.
    pub fn for_stage(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter().filter(move |d| d.stage == stage)
    }

    /// Records attached to one element.
    pub fn for_element<'a>(&'a self, element_id: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.records
            .iter()
            .filter(move |d| d.element_id.as_deref() == Some(element_id))
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_structured_records() {
        let mut diags = Diagnostics::new();
        diags.info(Stage::Optimize, "removed 2 short elements");
        diags.warn(Stage::Decompose, Some("W-1"), "ring has fewer than 3 points");

        assert_eq!(diags.len(), 2);
        assert!(diags.has_warnings());

        let warning = diags.warnings().next().unwrap();
        assert_eq!(warning.stage, Stage::Decompose);
        assert_eq!(warning.element_id.as_deref(), Some("W-1"));
        assert_eq!(diags.for_element("W-1").count(), 1);
        assert_eq!(diags.for_stage(Stage::Optimize).count(), 1);
        assert_eq!(diags.errors().count(), 0);

        diags.error(Stage::Snap, None, "reindex failed");
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::GridFactory.to_string(), "grid-factory");
        assert_eq!(Stage::NodeStore.as_str(), "node-store");
    }
}
