//! The voltage × frequency sweep.
//!
//! # State Machine
//!
//! ```text
//!            ┌──────────────── next cell ◄────────────────┐
//!            ▼                                            │
//!  ──► Checkpoint ──► Apply ──► Observe ──► Completed ──► Record + Save
//!          │            │          │                      ▲
//!          │         failed     aborted ──► CoolDown ─────┘
//!          │            └──────────────────────┘
//!          ▼
//!     Interrupted (no cool-down; recovery takes over)
//! ```
//!
//! Cells are visited voltage-major: every frequency at the first voltage,
//! then every frequency at the next. A failed cell never stops the sweep;
//! it only costs a cool-down cycle.

use crate::applier::{ApplyOutcome, ConfigurationApplier};
use crate::config::BenchConfig;
use crate::device::Device;
use crate::results::{Measurement, ResultSet, ResultStore};
use crate::sampler::{AbortReason, Observation, Sampler};
use crate::telemetry::TelemetryClient;
use crate::timing::Pacer;
use crate::tracing::prelude::*;
use crate::types::{Configuration, DefaultSettings};

/// State of one benchmark run.
///
/// Holds everything the recovery step needs: the settings to fall back
/// to and the measurements taken so far.
#[derive(Debug)]
pub struct SweepSession {
    defaults: DefaultSettings,
    results: ResultSet,
}

impl SweepSession {
    pub fn new(defaults: DefaultSettings) -> Self {
        Self {
            defaults,
            results: ResultSet::new(),
        }
    }

    pub fn defaults(&self) -> DefaultSettings {
        self.defaults
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn into_results(self) -> ResultSet {
        self.results
    }

    pub(crate) fn record(&mut self, measurement: Measurement) {
        self.results.push(measurement);
    }
}

/// How the sweep loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepEnd {
    /// Every cell was visited.
    Completed { attempted: usize, succeeded: usize },
    /// Stopped at a checkpoint after an interrupt.
    Interrupted { attempted: usize, succeeded: usize },
}

enum CellOutcome {
    Measured(Measurement),
    Failed,
    Interrupted,
}

pub struct SweepController<'a> {
    config: &'a BenchConfig,
    applier: ConfigurationApplier<'a>,
    sampler: Sampler<'a>,
    store: &'a ResultStore,
    pacer: Pacer,
}

impl<'a> SweepController<'a> {
    pub fn new(
        config: &'a BenchConfig,
        device: &'a dyn Device,
        store: &'a ResultStore,
        pacer: Pacer,
    ) -> Self {
        let telemetry = TelemetryClient::new(device, pacer.clone());
        Self {
            config,
            applier: ConfigurationApplier::new(device, pacer.clone()),
            sampler: Sampler::new(telemetry, pacer.clone(), config.max_temp_c),
            store,
            pacer,
        }
    }

    /// Visit every cell of the grid, recording successful measurements
    /// into `session` and saving them after each one.
    pub async fn run(&self, session: &mut SweepSession) -> SweepEnd {
        let cells = self.config.cell_count();
        let mut attempted = 0;
        let mut succeeded = 0;

        for (index, cell) in self.config.grid().enumerate() {
            if self.pacer.is_cancelled() {
                info!(attempted, succeeded, "Sweep interrupted");
                return SweepEnd::Interrupted {
                    attempted,
                    succeeded,
                };
            }

            info!(cell = index + 1, cells, config = %cell, "Testing configuration");
            attempted += 1;

            match self.run_cell(cell).await {
                CellOutcome::Measured(measurement) => {
                    session.record(measurement);
                    succeeded += 1;
                    self.store.save_or_warn(session.results());
                }
                CellOutcome::Failed => {
                    if self.pacer.is_cancelled() {
                        continue;
                    }
                    if !self.applier.cool_down(self.config.cool_down).await {
                        warn!(config = %self.config.cool_down, "Cool-down cycle did not complete");
                    }
                }
                CellOutcome::Interrupted => {
                    info!(attempted, succeeded, "Sweep interrupted");
                    return SweepEnd::Interrupted {
                        attempted,
                        succeeded,
                    };
                }
            }
        }

        info!(attempted, succeeded, "Sweep complete");
        SweepEnd::Completed {
            attempted,
            succeeded,
        }
    }

    async fn run_cell(&self, cell: Configuration) -> CellOutcome {
        if let ApplyOutcome::Failed(failure) = self.applier.apply(cell).await {
            warn!(config = %cell, error = %failure, "Could not apply configuration, skipping");
            return CellOutcome::Failed;
        }

        match self.sampler.observe(cell).await {
            Observation::Completed(measurement) => CellOutcome::Measured(measurement),
            Observation::Aborted(AbortReason::Interrupted) => CellOutcome::Interrupted,
            Observation::Aborted(_) => CellOutcome::Failed,
        }
    }
}
