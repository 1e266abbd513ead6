// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Staged normalization pipeline.
//!
//! `Raw → Decomposed → Optimized → Gridded → Snapped → Reindexed`. Each
//! stage runs once, in order; calling one out of turn fails with
//! [`Error::StageOrder`] and leaves the model untouched.

use serde::Serialize;
use strucnorm_core::{Diagnostics, Error, Model, ModelSummary, NormalizeConfig, Result, Stage};
use strucnorm_geometry::{DecomposeReport, ShellRouter};

use crate::grid_factory::{generate_master_grid, snap_nodes, MasterGrid, SnapReport};
use crate::grid_manager::{organize_grids, GridReport};
use crate::optimizer::{optimize, remove_orphan_nodes, OptimizeReport};

/// Pipeline position of a [`Normalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PipelineState {
    Raw,
    Decomposed,
    Optimized,
    Gridded,
    Snapped,
    Reindexed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Raw => "raw",
            PipelineState::Decomposed => "decomposed",
            PipelineState::Optimized => "optimized",
            PipelineState::Gridded => "gridded",
            PipelineState::Snapped => "snapped",
            PipelineState::Reindexed => "reindexed",
        }
    }
}

/// Per-stage statistics of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub shells_processed: usize,
    pub shells_skipped: usize,
    pub elements_from_shells: usize,
    pub optimize: Option<OptimizeReport>,
    pub master_angles: Vec<f64>,
    pub grid: Option<GridReport>,
    pub snap: Option<SnapReport>,
    pub final_orphans_removed: usize,
    pub summary: Option<ModelSummary>,
}

impl NormalizeReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Drives a model through every normalization stage.
#[derive(Debug)]
pub struct Normalizer {
    model: Model,
    config: NormalizeConfig,
    diagnostics: Diagnostics,
    state: PipelineState,
    master_grid: MasterGrid,
    report: NormalizeReport,
}

impl Normalizer {
    /// Validates `config` and adopts its node tolerance for the model's store.
    pub fn new(mut model: Model, config: NormalizeConfig) -> Result<Self> {
        config.validate()?;
        let mut diagnostics = Diagnostics::new();
        if model.nodes.tolerance() != config.node_tolerance {
            model.reindex(Some(config.node_tolerance), &mut diagnostics)?;
        }
        Ok(Self {
            model,
            config,
            diagnostics,
            state: PipelineState::Raw,
            master_grid: MasterGrid::default(),
            report: NormalizeReport::default(),
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn master_grid(&self) -> &MasterGrid {
        &self.master_grid
    }

    pub fn report(&self) -> &NormalizeReport {
        &self.report
    }

    fn expect_state(&self, expected: PipelineState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::StageOrder {
                expected: expected.as_str(),
                found: self.state.as_str(),
            })
        }
    }

    /// Logs a failed stage as an error diagnostic and passes the result on.
    fn record_failure<T>(&mut self, stage: Stage, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.diagnostics.error(stage, None, err.to_string());
        }
        result
    }

    /// Decomposes every queued wall and slab. Invalid shells are skipped.
    pub fn decompose(&mut self) -> Result<DecomposeReport> {
        self.expect_state(PipelineState::Raw)?;
        let report = ShellRouter::new().process_pending(&mut self.model, &mut self.diagnostics);
        self.report.shells_processed = report.processed;
        self.report.shells_skipped = report.skipped;
        self.report.elements_from_shells = report.created;
        self.state = PipelineState::Decomposed;
        Ok(report)
    }

    /// Pruning, optional transform and angle fixing.
    pub fn optimize(&mut self) -> Result<&OptimizeReport> {
        self.expect_state(PipelineState::Decomposed)?;
        let result = optimize(&mut self.model, &self.config, &mut self.diagnostics);
        let report = self.record_failure(Stage::Optimize, result)?;
        self.state = PipelineState::Optimized;
        Ok(&*self.report.optimize.insert(report))
    }

    /// Infers the master grid and stores it as named grid systems.
    pub fn generate_grids(&mut self) -> Result<GridReport> {
        self.expect_state(PipelineState::Optimized)?;
        let result = generate_master_grid(&self.model, &self.config.grid, &mut self.diagnostics);
        let grid = self.record_failure(Stage::GridFactory, result)?;
        let report = organize_grids(&mut self.model, &grid, &mut self.diagnostics);
        self.report.master_angles = grid.angles();
        self.report.grid = Some(report);
        self.master_grid = grid;
        self.state = PipelineState::Gridded;
        Ok(report)
    }

    /// Moves nodes onto grid intersections.
    pub fn snap(&mut self) -> Result<SnapReport> {
        self.expect_state(PipelineState::Gridded)?;
        let result = snap_nodes(
            &mut self.model,
            &self.master_grid,
            self.config.grid.max_distance,
            &mut self.diagnostics,
        );
        let report = self.record_failure(Stage::Snap, result)?;
        self.report.snap = Some(report);
        self.state = PipelineState::Snapped;
        Ok(report)
    }

    /// Drops nodes left orphaned by snapping merges and reindexes once more.
    pub fn finalize(&mut self) -> Result<ModelSummary> {
        self.expect_state(PipelineState::Snapped)?;
        self.report.final_orphans_removed = remove_orphan_nodes(&mut self.model, &mut self.diagnostics);
        let result = self.model.reindex(None, &mut self.diagnostics);
        self.record_failure(Stage::Pipeline, result)?;

        let summary = self.model.summary();
        self.report.summary = Some(summary);
        self.state = PipelineState::Reindexed;
        self.diagnostics.info(
            Stage::Pipeline,
            format!(
                "normalized: {} nodes, {} frames, {} walls, {} slabs, {} grid lines",
                summary.nodes,
                summary.beams + summary.columns + summary.spandrels,
                summary.walls,
                summary.slabs,
                summary.grid_lines
            ),
        );
        Ok(summary)
    }

    /// Runs every remaining stage in order.
    pub fn run_all(&mut self) -> Result<&NormalizeReport> {
        if self.state == PipelineState::Raw {
            self.decompose()?;
        }
        if self.state == PipelineState::Decomposed {
            self.optimize()?;
        }
        if self.state == PipelineState::Optimized {
            self.generate_grids()?;
        }
        if self.state == PipelineState::Gridded {
            self.snap()?;
        }
        if self.state == PipelineState::Snapped {
            self.finalize()?;
        }
        tracing::info!(model = %self.model.name, "Normalization finished");
        Ok(&self.report)
    }

    pub fn into_parts(self) -> (Model, Diagnostics, NormalizeReport) {
        (self.model, self.diagnostics, self.report)
    }
}

/// Normalizes `model` end to end.
pub fn normalize(model: Model, config: NormalizeConfig) -> Result<(Model, Diagnostics, NormalizeReport)> {
    let mut normalizer = Normalizer::new(model, config)?;
    normalizer.run_all()?;
    Ok(normalizer.into_parts())
}
