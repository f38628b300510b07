//! Benchmark configuration.
//!
//! All settings are compiled in. The device address and results path can
//! be overridden through the environment; nothing else can, so a run
//! cannot be pointed past the compiled-in ceilings.

use std::env;
use std::iter;
use std::path::PathBuf;

use thiserror::Error;

use crate::api_client::DEFAULT_BASE_URL;
use crate::results::DEFAULT_RESULTS_PATH;
use crate::timing::Timing;
use crate::types::Configuration;

pub const DEVICE_URL_ENV: &str = "AXEBENCH_DEVICE_URL";
pub const RESULTS_PATH_ENV: &str = "AXEBENCH_RESULTS_PATH";

#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Base URL of the device API.
    pub device_url: String,

    /// Core voltages to sweep (mV), outer loop.
    pub core_voltages: Vec<u32>,

    /// Frequencies to sweep (MHz), inner loop.
    pub frequencies: Vec<u32>,

    /// Hard ceiling for any voltage sent to the device (mV).
    pub max_allowed_voltage_mv: u32,

    /// Hard ceiling for any frequency sent to the device (MHz).
    pub max_allowed_frequency_mhz: u32,

    /// Samples at or above this temperature abort the window (°C).
    pub max_temp_c: f64,

    /// Low-power settings applied after a failed cell.
    pub cool_down: Configuration,

    pub timing: Timing,

    pub results_path: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            device_url: DEFAULT_BASE_URL.to_string(),
            core_voltages: vec![1150, 1200, 1250],
            frequencies: vec![550, 575, 600],
            max_allowed_voltage_mv: 1300,
            max_allowed_frequency_mhz: 600,
            max_temp_c: 66.0,
            cool_down: Configuration::new(1166, 400),
            timing: Timing::default(),
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("core voltage {value} mV exceeds the maximum allowed {ceiling} mV")]
    VoltageAboveCeiling { value: u32, ceiling: u32 },

    #[error("frequency {value} MHz exceeds the maximum allowed {ceiling} MHz")]
    FrequencyAboveCeiling { value: u32, ceiling: u32 },

    #[error("no core voltages or frequencies to sweep")]
    EmptyGrid,

    #[error("observation window is shorter than one sample interval")]
    EmptyWindow,
}

impl BenchConfig {
    /// Compiled-in defaults with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(DEVICE_URL_ENV).filter(|v| !v.is_empty()) {
            self.device_url = url;
        }
        if let Some(path) = lookup(RESULTS_PATH_ENV).filter(|v| !v.is_empty()) {
            self.results_path = PathBuf::from(path);
        }
        self
    }

    /// Reject the run before any device interaction.
    ///
    /// Every configuration the run could send, sweep cells and the
    /// cool-down point alike, must be within the ceilings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_voltages.is_empty() || self.frequencies.is_empty() {
            return Err(ConfigError::EmptyGrid);
        }

        let mut voltages = self
            .core_voltages
            .iter()
            .chain(iter::once(&self.cool_down.core_voltage_mv));
        if let Some(&value) = voltages.find(|&&v| v > self.max_allowed_voltage_mv) {
            return Err(ConfigError::VoltageAboveCeiling {
                value,
                ceiling: self.max_allowed_voltage_mv,
            });
        }

        let mut frequencies = self
            .frequencies
            .iter()
            .chain(iter::once(&self.cool_down.frequency_mhz));
        if let Some(&value) = frequencies.find(|&&f| f > self.max_allowed_frequency_mhz) {
            return Err(ConfigError::FrequencyAboveCeiling {
                value,
                ceiling: self.max_allowed_frequency_mhz,
            });
        }

        if self.timing.sample_count() == 0 {
            return Err(ConfigError::EmptyWindow);
        }

        Ok(())
    }

    /// Sweep cells in visiting order: voltage outer, frequency inner.
    pub fn grid(&self) -> impl Iterator<Item = Configuration> + '_ {
        self.core_voltages.iter().flat_map(move |&voltage| {
            self.frequencies
                .iter()
                .map(move |&frequency| Configuration::new(voltage, frequency))
        })
    }

    pub fn cell_count(&self) -> usize {
        self.core_voltages.len() * self.frequencies.len()
    }
}
