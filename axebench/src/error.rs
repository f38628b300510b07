//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::device::DeviceError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("benchmark failed: {0}")]
    Run(String),
}

pub type Result<T> = std::result::Result<T, Error>;
