//! Console summary of a finished run.

use std::fmt;

use crate::results::ResultSet;

/// Number of configurations listed in the summary.
pub const TOP_N: usize = 5;

/// Ranked listing of the best configurations.
pub struct Summary<'a> {
    results: &'a ResultSet,
    limit: usize,
}

impl<'a> Summary<'a> {
    pub fn new(results: &'a ResultSet) -> Self {
        Self {
            results,
            limit: TOP_N,
        }
    }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let top = self.results.top(self.limit);
        if top.is_empty() {
            return writeln!(f, "No valid results were found during benchmarking.");
        }

        writeln!(f, "Top {} Performing Settings:", top.len())?;
        for (rank, m) in top.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "Rank {}:", rank + 1)?;
            writeln!(f, "  Core Voltage: {}mV", m.configuration.core_voltage_mv)?;
            writeln!(f, "  Frequency: {}MHz", m.configuration.frequency_mhz)?;
            writeln!(f, "  Average Hashrate: {} GH/s", m.average_hash_rate)?;
            writeln!(f, "  Average Temperature: {}°C", m.average_temperature)?;
            writeln!(f, "  Average Power: {} W", m.average_power)?;
            writeln!(f, "  Efficiency: {:.2} J/TH", m.efficiency_jth)?;
        }
        Ok(())
    }
}
