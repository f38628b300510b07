//! Device API data transfer objects.
//!
//! These mirror the JSON served by the Bitaxe firmware. Only the fields
//! the benchmark reads are modeled; everything else is ignored.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::types::{Configuration, TelemetrySample};

/// Response of `GET /api/system/info`.
///
/// Every field is optional: firmware revisions differ, and a field that
/// is absent invalidates the sample rather than the whole response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Configured core voltage (mV).
    pub core_voltage: Option<u32>,
    /// Measured core voltage (mV).
    pub core_voltage_actual: Option<u32>,
    /// Configured ASIC frequency (MHz).
    pub frequency: Option<u32>,
    /// ASIC temperature (°C).
    pub temp: Option<f64>,
    /// Hashrate (GH/s).
    pub hash_rate: Option<f64>,
    /// Power draw (W).
    pub power: Option<f64>,
    pub hostname: Option<String>,
    #[serde(rename = "ASICModel")]
    pub asic_model: Option<String>,
}

/// Telemetry field absent from a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MissingField {
    Temperature,
    HashRate,
    Power,
}

impl SystemInfo {
    /// Extract a complete telemetry sample.
    ///
    /// Temperature is checked first so callers can tell "no temperature"
    /// apart from "no hashrate/power" the way the status output does.
    pub fn sample(&self) -> Result<TelemetrySample, MissingField> {
        let temperature = self.temp.ok_or(MissingField::Temperature)?;
        let hash_rate = self.hash_rate.ok_or(MissingField::HashRate)?;
        let power = self.power.ok_or(MissingField::Power)?;

        Ok(TelemetrySample {
            temperature,
            hash_rate,
            power,
        })
    }
}

/// Body of `PATCH /api/system`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub core_voltage: u32,
    pub frequency: u32,
}

impl From<Configuration> for SettingsPatch {
    fn from(config: Configuration) -> Self {
        Self {
            core_voltage: config.core_voltage_mv,
            frequency: config.frequency_mhz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_firmware_response_with_extra_fields() {
        let json = r#"{
            "power": 14.2,
            "voltage": 5087.5,
            "current": 2790,
            "temp": 58.25,
            "vrTemp": 49,
            "hashRate": 1102.4,
            "coreVoltage": 1200,
            "coreVoltageActual": 1194,
            "frequency": 575,
            "hostname": "bitaxe",
            "ASICModel": "BM1370",
            "fanspeed": 62
        }"#;

        let info: SystemInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.core_voltage, Some(1200));
        assert_eq!(info.core_voltage_actual, Some(1194));
        assert_eq!(info.frequency, Some(575));
        assert_eq!(info.asic_model.as_deref(), Some("BM1370"));
        assert_eq!(
            info.sample(),
            Ok(TelemetrySample {
                temperature: 58.25,
                hash_rate: 1102.4,
                power: 14.2,
            })
        );
    }

    #[test]
    fn missing_temperature_is_reported_before_other_fields() {
        let info = SystemInfo::default();
        assert_eq!(info.sample(), Err(MissingField::Temperature));
    }

    #[test]
    fn missing_power_is_reported() {
        let info = SystemInfo {
            temp: Some(50.0),
            hash_rate: Some(900.0),
            ..Default::default()
        };
        assert_eq!(info.sample(), Err(MissingField::Power));
    }

    #[test]
    fn patch_body_uses_device_field_names() {
        let body = SettingsPatch::from(Configuration::new(1166, 400));
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"coreVoltage": 1166, "frequency": 400})
        );
    }
}
