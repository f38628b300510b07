//! A complete benchmark run.
//!
//! Reads the device's starting settings, drives the sweep, and then
//! restores the device exactly once, whichever way the sweep ended. An
//! interrupt is observed through the cancellation token at the sweep's
//! checkpoints; the restore always happens here, on the main flow, never
//! inside a signal handler.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::api_client::Client;
use crate::config::BenchConfig;
use crate::device::Device;
use crate::error::Result;
use crate::recovery::{RecoveryManager, RecoveryTrigger};
use crate::report::Summary;
use crate::results::{ResultSet, ResultStore};
use crate::sweep::{SweepController, SweepEnd, SweepSession};
use crate::telemetry::TelemetryClient;
use crate::timing::Pacer;
use crate::tracing::prelude::*;

/// How the run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunEnd {
    Completed,
    Interrupted,
    /// The sweep panicked; carries the panic message.
    Failed(String),
}

impl RunEnd {
    fn trigger(&self) -> RecoveryTrigger {
        match self {
            RunEnd::Completed => RecoveryTrigger::Completed,
            RunEnd::Interrupted => RecoveryTrigger::Interrupted,
            RunEnd::Failed(_) => RecoveryTrigger::Failed,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub end: RunEnd,
    pub results: ResultSet,
}

impl RunReport {
    /// Ranking to print at exit. An interrupted run prints nothing; a
    /// failed one still reports what it measured.
    pub fn summary(&self) -> Option<Summary<'_>> {
        match self.end {
            RunEnd::Completed | RunEnd::Failed(_) => Some(Summary::new(&self.results)),
            RunEnd::Interrupted => None,
        }
    }
}

/// Validate `config` and build a client for its device.
///
/// Fails before any request is made if the configuration could send
/// values above the ceilings.
pub fn connect(config: &BenchConfig) -> Result<Client> {
    config.validate()?;
    Ok(Client::with_base_url(&config.device_url)?)
}

/// Run the benchmark against `device` until it completes, fails, or
/// `cancel` fires, and leave the device on the best known configuration.
pub async fn run(
    config: &BenchConfig,
    device: &dyn Device,
    cancel: CancellationToken,
) -> RunReport {
    let pacer = Pacer::new(config.timing.clone(), cancel.clone());
    let store = ResultStore::new(&config.results_path);

    let defaults = TelemetryClient::new(device, pacer.clone())
        .default_settings()
        .await;
    let mut session = SweepSession::new(defaults);
    let recovery = RecoveryManager::new(device, pacer.clone());
    let controller = SweepController::new(config, device, &store, pacer);

    let end = match AssertUnwindSafe(controller.run(&mut session))
        .catch_unwind()
        .await
    {
        Ok(SweepEnd::Completed { .. }) if !cancel.is_cancelled() => RunEnd::Completed,
        Ok(_) => RunEnd::Interrupted,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(error = %message, "An unexpected error occurred");
            RunEnd::Failed(message)
        }
    };

    recovery
        .restore_best_or_default(end.trigger(), &session)
        .await;
    store.save_or_warn(session.results());

    match &end {
        RunEnd::Completed => {
            info!("Benchmarking completed, device reset to best or default settings")
        }
        RunEnd::Interrupted => {
            warn!("Benchmarking interrupted, device reset to best or default settings")
        }
        RunEnd::Failed(_) => {
            warn!("Benchmarking failed, device reset to best or default settings")
        }
    }

    RunReport {
        end,
        results: session.into_results(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
