//! Named wait phases.
//!
//! Every suspension of the benchmark goes through [`Pacer::wait`] with
//! the phase it belongs to, so each wait's length comes from one place
//! and tests can drive them with tokio's paused clock.

use std::time::Duration;

use strum::Display;
use tokio_util::sync::CancellationToken;

use crate::tracing::prelude::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WaitPhase {
    /// After a settings patch, before the restart request.
    ApplySettle,
    /// After a restart request, while the device reboots.
    RestartSettle,
    /// Between two telemetry samples of an observation window.
    SampleInterval,
    /// Low-power hold between a failed cell and the next one.
    CoolDownHold,
    /// Between two attempts of a failed telemetry request.
    RetryBackoff,
}

impl WaitPhase {
    /// Phases an interrupt may cut short.
    ///
    /// Settle phases always run to completion so that no request reaches
    /// a device that is still rebooting.
    pub fn is_interruptible(self) -> bool {
        matches!(self, WaitPhase::SampleInterval | WaitPhase::CoolDownHold)
    }
}

/// Durations of all wait phases plus the observation window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    pub apply_settle: Duration,
    pub restart_settle: Duration,
    pub sample_interval: Duration,
    pub cool_down_hold: Duration,
    pub retry_backoff: Duration,
    /// Length of one observation window. Not a wait phase itself; the
    /// window is `sample_count()` samples spaced by `sample_interval`.
    pub observation_window: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            apply_settle: Duration::from_secs(2),
            restart_settle: Duration::from_secs(120),
            sample_interval: Duration::from_secs(150),
            cool_down_hold: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(5),
            observation_window: Duration::from_secs(9000),
        }
    }
}

impl Timing {
    pub fn duration(&self, phase: WaitPhase) -> Duration {
        match phase {
            WaitPhase::ApplySettle => self.apply_settle,
            WaitPhase::RestartSettle => self.restart_settle,
            WaitPhase::SampleInterval => self.sample_interval,
            WaitPhase::CoolDownHold => self.cool_down_hold,
            WaitPhase::RetryBackoff => self.retry_backoff,
        }
    }

    /// Number of samples in one observation window.
    ///
    /// Integer division: a window that is not a multiple of the interval
    /// is rounded down. Zero when the interval is zero.
    pub fn sample_count(&self) -> u32 {
        if self.sample_interval.is_zero() {
            return 0;
        }
        (self.observation_window.as_millis() / self.sample_interval.as_millis()) as u32
    }
}

/// How a wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Interrupted,
}

/// Performs the named waits, honoring cancellation where allowed.
#[derive(Clone, Debug)]
pub struct Pacer {
    timing: Timing,
    cancel: CancellationToken,
}

impl Pacer {
    pub fn new(timing: Timing, cancel: CancellationToken) -> Self {
        Self { timing, cancel }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// True once an interrupt has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn wait(&self, phase: WaitPhase) -> WaitOutcome {
        let duration = self.timing.duration(phase);
        trace!(phase = %phase, secs = duration.as_secs_f64(), "Waiting");

        if !phase.is_interruptible() {
            tokio::time::sleep(duration).await;
            return WaitOutcome::Elapsed;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!(phase = %phase, "Wait interrupted");
                WaitOutcome::Interrupted
            }
            _ = tokio::time::sleep(duration) => WaitOutcome::Elapsed,
        }
    }
}
