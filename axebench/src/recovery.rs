//! Restoring a known-good configuration at the end of a run.
//!
//! Whatever ends the run (the sweep finishing, an internal failure, or
//! an operator interrupt), the device must not be left on an arbitrary
//! sweep cell. [`RecoveryManager::restore_best_or_default`] puts it back
//! on the best measured configuration, or on the settings it started
//! with if nothing was measured. It acts once; later calls are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};

use strum::Display;

use crate::applier::{ApplyOutcome, ConfigurationApplier};
use crate::device::Device;
use crate::results::ResultSet;
use crate::sweep::SweepSession;
use crate::timing::Pacer;
use crate::tracing::prelude::*;
use crate::types::{Configuration, DefaultSettings};

/// Exit path that requested the restore.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecoveryTrigger {
    Completed,
    Failed,
    Interrupted,
}

/// Configuration chosen for the restore, and why.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreTarget {
    /// Highest average hashrate among the measurements.
    Best(Configuration),
    /// Nothing was measured.
    Default(Configuration),
}

impl RestoreTarget {
    pub fn configuration(self) -> Configuration {
        match self {
            RestoreTarget::Best(config) | RestoreTarget::Default(config) => config,
        }
    }
}

/// Pick the restore target: best measurement, earliest on ties, else the
/// defaults.
pub fn select_restore_target(results: &ResultSet, defaults: DefaultSettings) -> RestoreTarget {
    match results.best() {
        Some(best) => RestoreTarget::Best(best.configuration),
        None => RestoreTarget::Default(defaults.configuration()),
    }
}

pub struct RecoveryManager<'a> {
    applier: ConfigurationApplier<'a>,
    done: AtomicBool,
}

impl<'a> RecoveryManager<'a> {
    pub fn new(device: &'a dyn Device, pacer: Pacer) -> Self {
        Self {
            applier: ConfigurationApplier::new(device, pacer),
            done: AtomicBool::new(false),
        }
    }

    /// Apply the restore target, at most once per manager.
    ///
    /// Returns `true` if this call performed the restore, `false` if an
    /// earlier trigger already did. The apply always ends in a restart.
    pub async fn restore_best_or_default(
        &self,
        trigger: RecoveryTrigger,
        session: &SweepSession,
    ) -> bool {
        if self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(trigger = %trigger, "Restore already performed, ignoring");
            return false;
        }

        let target = select_restore_target(session.results(), session.defaults());
        match target {
            RestoreTarget::Best(config) => info!(
                trigger = %trigger,
                voltage_mv = config.core_voltage_mv,
                frequency_mhz = config.frequency_mhz,
                "Applying the best settings from benchmarking"
            ),
            RestoreTarget::Default(config) => warn!(
                trigger = %trigger,
                voltage_mv = config.core_voltage_mv,
                frequency_mhz = config.frequency_mhz,
                "No valid benchmarking results found, applying default settings"
            ),
        }

        if let ApplyOutcome::Failed(failure) = self.applier.apply(target.configuration()).await {
            error!(
                error = %failure,
                config = %target.configuration(),
                "Restore failed; check the device settings manually"
            );
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::device::fake::FakeDevice;
    use crate::results::{Measurement, efficiency_jth};
    use crate::timing::Timing;
    use crate::types::TelemetrySample;

    const DEFAULTS: Configuration = Configuration::new(1200, 525);

    fn measurement(voltage: u32, frequency: u32, hash_rate: f64) -> Measurement {
        Measurement {
            configuration: Configuration::new(voltage, frequency),
            average_hash_rate: hash_rate,
            average_temperature: 60.0,
            average_power: 20.0,
            efficiency_jth: efficiency_jth(20.0, hash_rate),
        }
    }

    fn results(entries: &[Measurement]) -> ResultSet {
        let mut results = ResultSet::new();
        for m in entries {
            results.push(*m);
        }
        results
    }

    fn device() -> FakeDevice {
        FakeDevice::steady(
            DEFAULTS,
            TelemetrySample {
                temperature: 50.0,
                hash_rate: 1000.0,
                power: 15.0,
            },
        )
    }

    fn manager(device: &FakeDevice) -> RecoveryManager<'_> {
        RecoveryManager::new(device, Pacer::new(Timing::default(), CancellationToken::new()))
    }

    #[test]
    fn selects_strict_maximum() {
        let results = results(&[
            measurement(1150, 550, 10.0),
            measurement(1200, 575, 12.0),
            measurement(1250, 600, 11.0),
        ]);

        assert_eq!(
            select_restore_target(&results, DefaultSettings::new(DEFAULTS)),
            RestoreTarget::Best(Configuration::new(1200, 575))
        );
    }

    #[test]
    fn selects_earliest_on_ties() {
        let results = results(&[
            measurement(1150, 550, 12.0),
            measurement(1200, 575, 12.0),
        ]);

        assert_eq!(
            select_restore_target(&results, DefaultSettings::new(DEFAULTS)),
            RestoreTarget::Best(Configuration::new(1150, 550))
        );
    }

    #[test]
    fn selects_defaults_when_empty() {
        assert_eq!(
            select_restore_target(&ResultSet::new(), DefaultSettings::new(DEFAULTS)),
            RestoreTarget::Default(DEFAULTS)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restores_best_configuration() {
        let device = device();
        let manager = manager(&device);
        let mut session = SweepSession::new(DefaultSettings::new(DEFAULTS));
        session.record(measurement(1150, 550, 10.0));
        session.record(measurement(1200, 575, 12.0));

        assert!(
            manager
                .restore_best_or_default(RecoveryTrigger::Completed, &session)
                .await
        );
        assert_eq!(device.active(), Configuration::new(1200, 575));
        assert_eq!(device.restarts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restores_defaults_without_results() {
        let device = FakeDevice::steady(
            Configuration::new(1250, 600),
            TelemetrySample {
                temperature: 50.0,
                hash_rate: 1000.0,
                power: 15.0,
            },
        );
        let manager = manager(&device);
        let session = SweepSession::new(DefaultSettings::new(DEFAULTS));

        manager
            .restore_best_or_default(RecoveryTrigger::Interrupted, &session)
            .await;

        assert_eq!(device.patches(), vec![DEFAULTS]);
        assert_eq!(device.active(), DEFAULTS);
    }

    #[tokio::test(start_paused = true)]
    async fn acts_exactly_once_across_all_triggers() {
        let device = device();
        let manager = manager(&device);
        let session = SweepSession::new(DefaultSettings::new(DEFAULTS));

        let performed = [
            manager
                .restore_best_or_default(RecoveryTrigger::Completed, &session)
                .await,
            manager
                .restore_best_or_default(RecoveryTrigger::Failed, &session)
                .await,
            manager
                .restore_best_or_default(RecoveryTrigger::Interrupted, &session)
                .await,
        ];

        assert_eq!(performed, [true, false, false]);
        assert_eq!(device.patches().len(), 1);
        assert_eq!(device.restarts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_restore_still_counts_as_done() {
        let device = device();
        device.fail_patches(true);
        let manager = manager(&device);
        let session = SweepSession::new(DefaultSettings::new(DEFAULTS));

        assert!(
            manager
                .restore_best_or_default(RecoveryTrigger::Failed, &session)
                .await
        );
        assert!(
            !manager
                .restore_best_or_default(RecoveryTrigger::Interrupted, &session)
                .await
        );
    }
}
