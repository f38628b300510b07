//! Measurements and their persistence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracing::prelude::*;
use crate::types::Configuration;

/// Default results file, relative to the working directory.
pub const DEFAULT_RESULTS_PATH: &str = "bitaxe_benchmark_results.json";

/// Averages over one complete observation window.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Measurement {
    #[serde(flatten)]
    pub configuration: Configuration,
    /// GH/s.
    #[serde(rename = "averageHashRate")]
    pub average_hash_rate: f64,
    /// °C.
    #[serde(rename = "averageTemperature")]
    pub average_temperature: f64,
    /// W.
    #[serde(rename = "averagePower")]
    pub average_power: f64,
    /// Joules per terahash; lower is better.
    #[serde(rename = "efficiencyJTH")]
    pub efficiency_jth: f64,
}

/// Power per unit of hashing throughput, in J/TH.
///
/// `hash_rate` is in GH/s and converted to TH/s for the ratio.
pub fn efficiency_jth(power: f64, hash_rate: f64) -> f64 {
    power / (hash_rate / 1_000.0)
}

/// Measurements of a run in the order they completed.
///
/// Append-only: entries are never removed or changed once pushed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    entries: Vec<Measurement>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.entries.push(measurement);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.entries
    }

    /// The measurement with the highest average hashrate.
    ///
    /// Among equal hashrates the earliest one wins.
    pub fn best(&self) -> Option<&Measurement> {
        self.entries.iter().reduce(|best, candidate| {
            if candidate.average_hash_rate > best.average_hash_rate {
                candidate
            } else {
                best
            }
        })
    }

    /// All measurements by hashrate, highest first, ties in insertion order.
    pub fn ranked(&self) -> Vec<&Measurement> {
        let mut ranked: Vec<&Measurement> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.average_hash_rate.total_cmp(&a.average_hash_rate));
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<&Measurement> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

/// JSON file holding the current result set.
///
/// Each save rewrites the whole file. The data goes to a sibling
/// temporary file first and is renamed into place, so readers never see
/// a partial write.
#[derive(Clone, Debug)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, results: &ResultSet) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(results.as_slice())?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;

        Ok(())
    }

    /// Save, logging instead of failing. Used at checkpoints where a full
    /// disk must not stop the sweep.
    pub fn save_or_warn(&self, results: &ResultSet) -> bool {
        match self.save(results) {
            Ok(()) => {
                info!(
                    path = %self.path.display(),
                    entries = results.len(),
                    "Results saved"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "Error saving results");
                false
            }
        }
    }

    pub fn load(&self) -> Result<Vec<Measurement>, StoreError> {
        let json = fs::read_to_string(&self.path).map_err(|source| StoreError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
