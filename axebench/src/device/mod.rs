//! The device under test.
//!
//! The benchmark talks to the miner only through [`Device`], which keeps
//! the sweep logic independent of the HTTP transport. The production
//! implementation is [`crate::api_client::Client`].

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use thiserror::Error;

use crate::api_client::types::SystemInfo;
use crate::types::Configuration;

/// Remote control surface of a miner.
///
/// Calls are issued strictly one at a time; implementations need not
/// handle concurrent requests.
#[async_trait]
pub trait Device: Send + Sync {
    /// Read current status and telemetry.
    async fn system_info(&self) -> Result<SystemInfo, DeviceError>;

    /// Store a new core voltage and frequency. Takes effect after restart.
    async fn patch_settings(&self, config: Configuration) -> Result<(), DeviceError>;

    /// Reboot the device. It is unreachable for a while afterwards.
    async fn restart(&self) -> Result<(), DeviceError>;
}

/// Failure of a single device request.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("device returned HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl DeviceError {
    /// Network-level failures that may succeed on another attempt.
    ///
    /// Protocol failures (bad status, unparseable body) are not retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Timeout | DeviceError::Connect(_))
    }
}

impl From<reqwest::Error> for DeviceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DeviceError::Timeout
        } else if err.is_connect() {
            DeviceError::Connect(err.to_string())
        } else if let Some(status) = err.status() {
            DeviceError::Status(status.as_u16())
        } else if err.is_decode() {
            DeviceError::Decode(err.to_string())
        } else {
            DeviceError::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(DeviceError::Timeout, true; "timeout")]
    #[test_case(DeviceError::Connect("refused".into()), true; "connect")]
    #[test_case(DeviceError::Status(500), false; "status")]
    #[test_case(DeviceError::Decode("eof".into()), false; "decode")]
    #[test_case(DeviceError::Request("builder".into()), false; "request")]
    fn classifies_transient_errors(err: DeviceError, transient: bool) {
        assert_eq!(err.is_transient(), transient);
    }
}
