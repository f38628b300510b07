//! One observation window.
//!
//! Samples telemetry at a fixed interval for the length of the window and
//! averages the readings. A single bad sample (missing data or a
//! temperature at or above the limit) ends the window and throws away
//! everything collected so far; only complete windows yield a
//! [`Measurement`].

use std::fmt;

use crate::api_client::types::MissingField;
use crate::results::{Measurement, efficiency_jth};
use crate::telemetry::TelemetryClient;
use crate::timing::{Pacer, WaitOutcome, WaitPhase};
use crate::tracing::prelude::*;
use crate::types::{Configuration, TelemetrySample};

/// Outcome of observing one configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Observation {
    Completed(Measurement),
    Aborted(AbortReason),
}

/// Why a window ended early.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AbortReason {
    /// Telemetry could not be read at all.
    TelemetryUnavailable,
    /// A response lacked a required field.
    MissingField(MissingField),
    /// Temperature reached the safety limit.
    Overheat { temperature: f64, limit: f64 },
    /// The window averaged zero hashrate, so efficiency is undefined.
    NoHashrate,
    /// The window holds no samples.
    EmptyWindow,
    /// An interrupt was requested.
    Interrupted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::TelemetryUnavailable => write!(f, "telemetry unavailable"),
            AbortReason::MissingField(field) => write!(f, "{field} data not available"),
            AbortReason::Overheat { temperature, limit } => {
                write!(f, "temperature {temperature}°C reached limit {limit}°C")
            }
            AbortReason::NoHashrate => write!(f, "no hashrate"),
            AbortReason::EmptyWindow => write!(f, "observation window holds no samples"),
            AbortReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Running sums over the samples of the current window.
#[derive(Debug, Default)]
struct WindowSums {
    hash_rate: f64,
    temperature: f64,
    power: f64,
    count: u32,
}

impl WindowSums {
    fn add(&mut self, sample: &TelemetrySample) {
        self.hash_rate += sample.hash_rate;
        self.temperature += sample.temperature;
        self.power += sample.power;
        self.count += 1;
    }

    fn finish(self, configuration: Configuration) -> Observation {
        if self.count == 0 {
            return Observation::Aborted(AbortReason::EmptyWindow);
        }

        let n = f64::from(self.count);
        let average_hash_rate = self.hash_rate / n;
        let average_power = self.power / n;
        if average_hash_rate <= 0.0 {
            return Observation::Aborted(AbortReason::NoHashrate);
        }

        Observation::Completed(Measurement {
            configuration,
            average_hash_rate,
            average_temperature: self.temperature / n,
            average_power,
            efficiency_jth: efficiency_jth(average_power, average_hash_rate),
        })
    }
}

pub struct Sampler<'a> {
    telemetry: TelemetryClient<'a>,
    pacer: Pacer,
    /// Hard temperature cutoff, °C.
    max_temp: f64,
}

impl<'a> Sampler<'a> {
    pub fn new(telemetry: TelemetryClient<'a>, pacer: Pacer, max_temp: f64) -> Self {
        Self {
            telemetry,
            pacer,
            max_temp,
        }
    }

    /// Observe the device, assumed to be running `configuration`.
    pub async fn observe(&self, configuration: Configuration) -> Observation {
        let total = self.pacer.timing().sample_count();
        info!(
            voltage_mv = configuration.core_voltage_mv,
            frequency_mhz = configuration.frequency_mhz,
            samples = total,
            "Starting benchmark"
        );

        let mut sums = WindowSums::default();

        for index in 0..total {
            if self.pacer.is_cancelled() {
                return self.abort(configuration, AbortReason::Interrupted);
            }

            let sample = match self.read_sample().await {
                Ok(sample) => sample,
                Err(reason) => return self.abort(configuration, reason),
            };
            sums.add(&sample);

            let done = index + 1;
            info!(
                sample = done,
                total,
                progress_pct = format!("{:.2}", f64::from(done) / f64::from(total) * 100.0),
                hash_rate_ghs = sample.hash_rate,
                temp_c = sample.temperature,
                config = %configuration,
                "Sample collected"
            );

            if done < total
                && self.pacer.wait(WaitPhase::SampleInterval).await == WaitOutcome::Interrupted
            {
                return self.abort(configuration, AbortReason::Interrupted);
            }
        }

        let observation = sums.finish(configuration);
        match &observation {
            Observation::Completed(m) => info!(
                config = %configuration,
                average_hash_rate_ghs = m.average_hash_rate,
                average_temp_c = m.average_temperature,
                average_power_w = m.average_power,
                efficiency_jth = format!("{:.2}", m.efficiency_jth),
                "Benchmark complete"
            ),
            Observation::Aborted(reason) => {
                warn!(config = %configuration, reason = %reason, "No usable data collected")
            }
        }
        observation
    }

    /// Read one sample and apply the safety and completeness checks.
    async fn read_sample(&self) -> Result<TelemetrySample, AbortReason> {
        let info = self
            .telemetry
            .fetch()
            .await
            .ok_or(AbortReason::TelemetryUnavailable)?;

        // Temperature first: an overheating device aborts even if other
        // fields are missing.
        let temperature = info
            .temp
            .ok_or(AbortReason::MissingField(MissingField::Temperature))?;
        if temperature >= self.max_temp {
            return Err(AbortReason::Overheat {
                temperature,
                limit: self.max_temp,
            });
        }

        info.sample().map_err(AbortReason::MissingField)
    }

    fn abort(&self, configuration: Configuration, reason: AbortReason) -> Observation {
        match reason {
            AbortReason::Overheat { .. } => {
                error!(config = %configuration, reason = %reason, "Stopping current benchmark")
            }
            AbortReason::Interrupted => {
                info!(config = %configuration, "Benchmark interrupted")
            }
            _ => warn!(config = %configuration, reason = %reason, "Skipping this configuration"),
        }
        Observation::Aborted(reason)
    }
}
