//! Voltage and frequency sweep benchmark for Bitaxe miners.
//!
//! Applies each candidate operating point to the device, samples its
//! telemetry over a fixed observation window, and records the averages.
//! However the run ends, the device is put back on the best measured
//! configuration or, failing that, the settings it started with.

pub mod api_client;
pub mod applier;
pub mod benchmark;
pub mod config;
pub mod device;
pub mod error;
pub mod recovery;
pub mod report;
pub mod results;
pub mod sampler;
pub mod sweep;
pub mod telemetry;
pub mod timing;
pub mod tracing;
pub mod types;
