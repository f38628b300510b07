//! Telemetry reads with bounded retry.

use crate::api_client::types::SystemInfo;
use crate::device::Device;
use crate::timing::{Pacer, WaitPhase};
use crate::tracing::prelude::*;
use crate::types::{Configuration, DefaultSettings};

/// Attempts per telemetry read, including the first.
pub const MAX_ATTEMPTS: u32 = 3;

/// Used per field when the device omits its current voltage or frequency.
pub const MISSING_FIELD_DEFAULTS: Configuration = Configuration::new(1250, 550);

/// Used when the device cannot be reached at startup.
pub const UNREACHABLE_DEFAULTS: Configuration = Configuration::new(1200, 550);

/// Reads device status, retrying transient network failures.
pub struct TelemetryClient<'a> {
    device: &'a dyn Device,
    pacer: Pacer,
    max_attempts: u32,
}

impl<'a> TelemetryClient<'a> {
    pub fn new(device: &'a dyn Device, pacer: Pacer) -> Self {
        Self {
            device,
            pacer,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Fetch the current status, or `None` if it is unavailable.
    ///
    /// Timeouts and connection failures are retried after the retry
    /// backoff, up to [`MAX_ATTEMPTS`] in total. Any other failure ends
    /// the read at once.
    pub async fn fetch(&self) -> Option<SystemInfo> {
        for attempt in 1..=self.max_attempts {
            match self.device.system_info().await {
                Ok(info) => return Some(info),
                Err(e) if e.is_transient() => {
                    warn!(
                        error = %e,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Failed to fetch system info"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Error fetching system info");
                    return None;
                }
            }

            if attempt < self.max_attempts {
                self.pacer.wait(WaitPhase::RetryBackoff).await;
            }
        }

        None
    }

    /// Read the settings the device is running before anything changes.
    pub async fn default_settings(&self) -> DefaultSettings {
        let config = match self.fetch().await {
            Some(info) => {
                info!(
                    hostname = info.hostname.as_deref().unwrap_or("unknown"),
                    asic_model = info.asic_model.as_deref().unwrap_or("unknown"),
                    core_voltage_actual_mv = ?info.core_voltage_actual,
                    "Connected to device"
                );
                Configuration::new(
                    info.core_voltage
                        .unwrap_or(MISSING_FIELD_DEFAULTS.core_voltage_mv),
                    info.frequency
                        .unwrap_or(MISSING_FIELD_DEFAULTS.frequency_mhz),
                )
            }
            None => {
                error!(
                    fallback = %UNREACHABLE_DEFAULTS,
                    "Could not read default settings, using fallback"
                );
                UNREACHABLE_DEFAULTS
            }
        };

        info!(
            voltage_mv = config.core_voltage_mv,
            frequency_mhz = config.frequency_mhz,
            "Default settings determined"
        );

        DefaultSettings::new(config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::device::DeviceError;
    use crate::device::fake::{FakeDevice, info_from};
    use crate::timing::Timing;
    use crate::types::TelemetrySample;

    const BOOT: Configuration = Configuration::new(1180, 525);

    fn pacer() -> Pacer {
        Pacer::new(Timing::default(), CancellationToken::new())
    }

    fn healthy(config: Configuration) -> SystemInfo {
        info_from(
            config,
            TelemetrySample {
                temperature: 55.0,
                hash_rate: 1000.0,
                power: 15.0,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_successful_response() {
        let device = FakeDevice::with_responder(BOOT, |probe| Ok(healthy(probe.active)));
        let client = TelemetryClient::new(&device, pacer());

        let info = client.fetch().await.unwrap();

        assert_eq!(info.temp, Some(55.0));
        assert_eq!(device.info_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_backoff() {
        let device = FakeDevice::with_responder(BOOT, |probe| match probe.call {
            0 => Err(DeviceError::Timeout),
            1 => Err(DeviceError::Connect("refused".into())),
            _ => Ok(healthy(probe.active)),
        });
        let client = TelemetryClient::new(&device, pacer());
        let start = Instant::now();

        assert!(client.fetch().await.is_some());
        assert_eq!(device.info_calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_retry_budget() {
        let device = FakeDevice::with_responder(BOOT, |_| Err(DeviceError::Timeout));
        let client = TelemetryClient::new(&device, pacer());

        assert!(client.fetch().await.is_none());
        assert_eq!(device.info_calls(), MAX_ATTEMPTS as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn protocol_error_is_not_retried() {
        let device =
            FakeDevice::with_responder(BOOT, |_| Err(DeviceError::Decode("expected value".into())));
        let client = TelemetryClient::new(&device, pacer());
        let start = Instant::now();

        assert!(client.fetch().await.is_none());
        assert_eq!(device.info_calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn default_settings_come_from_device() {
        let device = FakeDevice::with_responder(BOOT, |probe| Ok(healthy(probe.active)));
        let client = TelemetryClient::new(&device, pacer());

        assert_eq!(client.default_settings().await.configuration(), BOOT);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_default_fields_fall_back_individually() {
        let device = FakeDevice::with_responder(BOOT, |_| {
            Ok(SystemInfo {
                frequency: Some(600),
                ..Default::default()
            })
        });
        let client = TelemetryClient::new(&device, pacer());

        assert_eq!(
            client.default_settings().await.configuration(),
            Configuration::new(1250, 600)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_device_yields_fallback_defaults() {
        let device = FakeDevice::with_responder(BOOT, |_| Err(DeviceError::Timeout));
        let client = TelemetryClient::new(&device, pacer());

        assert_eq!(
            client.default_settings().await.configuration(),
            UNREACHABLE_DEFAULTS
        );
    }
}
