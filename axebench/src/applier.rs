//! Pushing operating points to the device.
//!
//! The firmware only picks up new settings on reboot, so every apply is
//! a patch, a short settle, a restart, and a long settle while the
//! device comes back up.

use thiserror::Error;

use crate::device::{Device, DeviceError};
use crate::timing::{Pacer, WaitOutcome, WaitPhase};
use crate::tracing::prelude::*;
use crate::types::Configuration;

/// Result of applying a configuration.
#[derive(Debug)]
pub enum ApplyOutcome {
    Applied,
    Failed(ApplyFailure),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

/// Which step of an apply went wrong.
#[derive(Debug, Error)]
pub enum ApplyFailure {
    /// The settings were rejected or never arrived.
    #[error("settings not accepted: {0}")]
    Patch(DeviceError),
    /// Settings may or may not be live; the device state is uncertain.
    #[error("restart failed: {0}")]
    Restart(DeviceError),
}

pub struct ConfigurationApplier<'a> {
    device: &'a dyn Device,
    pacer: Pacer,
}

impl<'a> ConfigurationApplier<'a> {
    pub fn new(device: &'a dyn Device, pacer: Pacer) -> Self {
        Self { device, pacer }
    }

    /// Patch `config` onto the device and reboot it.
    ///
    /// The restart is issued even when the patch fails, and the call
    /// returns only after the restart settle period. Failures are
    /// reported in the outcome, never raised.
    pub async fn apply(&self, config: Configuration) -> ApplyOutcome {
        info!(
            voltage_mv = config.core_voltage_mv,
            frequency_mhz = config.frequency_mhz,
            "Applying settings"
        );

        let patched = self.device.patch_settings(config).await;
        if let Err(e) = &patched {
            error!(error = %e, config = %config, "Error setting system settings");
        }

        self.pacer.wait(WaitPhase::ApplySettle).await;
        let restarted = self.restart().await;

        match (patched, restarted) {
            (Err(e), _) => ApplyOutcome::Failed(ApplyFailure::Patch(e)),
            (Ok(()), Err(e)) => ApplyOutcome::Failed(ApplyFailure::Restart(e)),
            (Ok(()), Ok(())) => ApplyOutcome::Applied,
        }
    }

    /// Reboot the device and wait for it to come back.
    ///
    /// The settle wait happens only if the restart request succeeded.
    pub async fn restart(&self) -> Result<(), DeviceError> {
        info!("Restarting device to apply new settings");

        match self.device.restart().await {
            Ok(()) => {
                self.pacer.wait(WaitPhase::RestartSettle).await;
                Ok(())
            }
            Err(e) => {
                error!(
                    error = %e,
                    "Error restarting the device; its state is uncertain"
                );
                Err(e)
            }
        }
    }

    /// Run one cool-down cycle: low-power settings, hold, restart.
    ///
    /// Returns `false` if any step failed or the hold was interrupted.
    /// Never raises; a failed cool-down does not stop the sweep.
    pub async fn cool_down(&self, config: Configuration) -> bool {
        let hold = self.pacer.timing().cool_down_hold;
        info!(
            voltage_mv = config.core_voltage_mv,
            frequency_mhz = config.frequency_mhz,
            hold_secs = hold.as_secs(),
            "Cooling down"
        );

        let applied = self.apply(config).await;
        if let ApplyOutcome::Failed(failure) = &applied {
            warn!(error = %failure, "Cool-down settings not applied");
        }

        if self.pacer.wait(WaitPhase::CoolDownHold).await == WaitOutcome::Interrupted {
            info!("Cool-down interrupted");
            return false;
        }

        let restarted = self.restart().await.is_ok();
        applied.is_applied() && restarted
    }
}
