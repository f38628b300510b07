//! Scripted in-memory device for tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Device, DeviceError};
use crate::api_client::types::SystemInfo;
use crate::types::{Configuration, TelemetrySample};

/// A request the fake received, in order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Call {
    SystemInfo,
    Patch(Configuration),
    Restart,
}

/// What the telemetry responder knows when answering.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Probe {
    /// Configuration the device is running, i.e. patched and restarted.
    pub active: Configuration,
    /// Zero-based index of this `system_info` call.
    pub call: usize,
}

type Responder = Box<dyn FnMut(Probe) -> Result<SystemInfo, DeviceError> + Send>;
type Hook = Box<dyn FnMut(Probe) + Send>;

struct State {
    calls: Vec<Call>,
    pending: Option<Configuration>,
    active: Configuration,
    info_calls: usize,
    responder: Responder,
    on_info: Option<Hook>,
    fail_patch: bool,
    fail_restart: bool,
}

/// Device double with a pluggable telemetry responder.
///
/// Patches are staged and only become active on restart, like the real
/// firmware. Cloning shares state, so a test can keep a handle for
/// assertions after lending one to the code under test.
#[derive(Clone)]
pub(crate) struct FakeDevice {
    state: Arc<Mutex<State>>,
}

pub(crate) fn info_from(config: Configuration, sample: TelemetrySample) -> SystemInfo {
    SystemInfo {
        core_voltage: Some(config.core_voltage_mv),
        frequency: Some(config.frequency_mhz),
        temp: Some(sample.temperature),
        hash_rate: Some(sample.hash_rate),
        power: Some(sample.power),
        ..Default::default()
    }
}

impl FakeDevice {
    /// A device booted at `initial` that always reports `sample`.
    pub fn steady(initial: Configuration, sample: TelemetrySample) -> Self {
        Self::with_responder(initial, move |probe| Ok(info_from(probe.active, sample)))
    }

    pub fn with_responder<F>(initial: Configuration, responder: F) -> Self
    where
        F: FnMut(Probe) -> Result<SystemInfo, DeviceError> + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(State {
                calls: Vec::new(),
                pending: None,
                active: initial,
                info_calls: 0,
                responder: Box::new(responder),
                on_info: None,
                fail_patch: false,
                fail_restart: false,
            })),
        }
    }

    /// Run `hook` before every telemetry response.
    pub fn on_info<F>(self, hook: F) -> Self
    where
        F: FnMut(Probe) + Send + 'static,
    {
        self.state.lock().on_info = Some(Box::new(hook));
        self
    }

    pub fn fail_patches(&self, fail: bool) {
        self.state.lock().fail_patch = fail;
    }

    pub fn fail_restarts(&self, fail: bool) {
        self.state.lock().fail_restart = fail;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn active(&self) -> Configuration {
        self.state.lock().active
    }

    pub fn patches(&self) -> Vec<Configuration> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Patch(config) => Some(config),
                _ => None,
            })
            .collect()
    }

    pub fn restarts(&self) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| *call == Call::Restart)
            .count()
    }

    pub fn info_calls(&self) -> usize {
        self.state.lock().info_calls
    }
}

#[async_trait]
impl Device for FakeDevice {
    async fn system_info(&self) -> Result<SystemInfo, DeviceError> {
        let mut state = self.state.lock();
        state.calls.push(Call::SystemInfo);
        let probe = Probe {
            active: state.active,
            call: state.info_calls,
        };
        state.info_calls += 1;
        if let Some(hook) = state.on_info.as_mut() {
            hook(probe);
        }
        (state.responder)(probe)
    }

    async fn patch_settings(&self, config: Configuration) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Patch(config));
        if state.fail_patch {
            return Err(DeviceError::Status(500));
        }
        state.pending = Some(config);
        Ok(())
    }

    async fn restart(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Restart);
        if state.fail_restart {
            return Err(DeviceError::Connect("connection refused".into()));
        }
        if let Some(config) = state.pending.take() {
            state.active = config;
        }
        Ok(())
    }
}
