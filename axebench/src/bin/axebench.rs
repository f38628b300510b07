//! Bitaxe voltage/frequency sweep.
//!
//! Sweeps the compiled-in grid against the device at
//! `AXEBENCH_DEVICE_URL` (default `http://192.168.2.117`), writes results
//! to `AXEBENCH_RESULTS_PATH`, and prints the top configurations. Ctrl-C
//! stops the sweep and restores the best settings found so far.

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use axebench::benchmark::{self, RunEnd};
use axebench::config::BenchConfig;
use axebench::error::Error;
use axebench::tracing::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    axebench::tracing::init_journald_or_stdout();

    let config = BenchConfig::from_env();
    let client = benchmark::connect(&config)?;
    info!(
        device = %client.base_url(),
        cells = config.cell_count(),
        results = %config.results_path.display(),
        "Starting benchmark"
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    let report = benchmark::run(&config, &client, cancel).await;

    if let RunEnd::Failed(message) = &report.end {
        error!(error = %Error::Run(message.clone()), "Benchmarking did not finish");
    }
    if let Some(summary) = report.summary() {
        println!("{summary}");
    }

    Ok(())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
///
/// The handler only flips the token. The sweep notices at its next
/// checkpoint and the restore runs on the main task. Later signals are
/// swallowed so a second Ctrl-C cannot cut the restore short.
fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Benchmarking interrupted by user, restoring settings (this takes a few minutes)");
        cancel.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
