//! Core value types shared across the benchmark.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A device operating point.
///
/// Serialized with the device API's field names so the same shape works
/// for `PATCH /api/system` bodies and for entries in the results file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Configuration {
    /// ASIC core voltage in millivolts.
    #[serde(rename = "coreVoltage")]
    pub core_voltage_mv: u32,
    /// ASIC clock frequency in megahertz.
    #[serde(rename = "frequency")]
    pub frequency_mhz: u32,
}

impl Configuration {
    pub const fn new(core_voltage_mv: u32, frequency_mhz: u32) -> Self {
        Self {
            core_voltage_mv,
            frequency_mhz,
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mV @ {} MHz", self.core_voltage_mv, self.frequency_mhz)
    }
}

/// Settings the device reported before the sweep started.
///
/// The last-resort restore target when no configuration produced a
/// measurement. Never modified once read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultSettings(Configuration);

impl DefaultSettings {
    pub const fn new(configuration: Configuration) -> Self {
        Self(configuration)
    }

    pub fn configuration(&self) -> Configuration {
        self.0
    }
}

/// One telemetry reading with every field the sampler needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TelemetrySample {
    /// ASIC temperature in °C.
    pub temperature: f64,
    /// Hashrate in GH/s.
    pub hash_rate: f64,
    /// Power draw in watts.
    pub power: f64,
}
