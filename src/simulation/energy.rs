//! Per-transmission energy accounting and battery autonomy estimate.

use serde::Serialize;

use super::signal_calculations::{calculate_air_time, transmit_current_ma};
use super::stats::SampleStats;

/// 2600 mAh at 3.7 V = 9.62 Wh.
pub const DEFAULT_BATTERY_CAPACITY_J: f64 = 34_632.0;

/// Supply voltage of the radio module.
pub const DEFAULT_SUPPLY_VOLTAGE: f64 = 3.3;

/// Energy (J) drawn by a single uplink: `V × I × time_on_air`.
pub fn transmission_energy(spreading_factor: u8, tx_power_dbm: f64, payload_bytes: usize, supply_voltage: f64) -> f64 {
    let current_a = transmit_current_ma(tx_power_dbm) / 1000.0;
    supply_voltage * current_a * calculate_air_time(spreading_factor, payload_bytes)
}

/// Accumulates one energy sample per transmission.
#[derive(Debug)]
pub struct EnergyAccountant {
    supply_voltage: f64,
    samples_j: Vec<f64>,
    total_j: f64,
}

/// End-of-run energy figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnergyReport {
    pub transmissions: usize,
    pub total_j: f64,
    pub per_transmission: SampleStats,
    /// How many transmissions the battery would sustain at the mean cost.
    pub estimated_transmissions: f64,
    /// Battery life in hours at one transmission per send interval.
    pub autonomy_hours: f64,
    /// Energy spent per delivered bit (mJ/bit), when anything was delivered.
    pub energy_per_bit_mj: Option<f64>,
}

impl EnergyAccountant {
    pub fn new(supply_voltage: f64) -> Self {
        Self {
            supply_voltage,
            samples_j: Vec::new(),
            total_j: 0.0,
        }
    }

    /// Compute and record the energy of one transmission.
    pub fn energy_for_transmission(&mut self, spreading_factor: u8, tx_power_dbm: f64, payload_bytes: usize) -> f64 {
        let energy = transmission_energy(spreading_factor, tx_power_dbm, payload_bytes, self.supply_voltage);
        self.total_j += energy;
        self.samples_j.push(energy);
        energy
    }

    #[cfg(test)]
    pub fn transmissions(&self) -> usize {
        self.samples_j.len()
    }

    #[cfg(test)]
    pub fn total_j(&self) -> f64 {
        self.total_j
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[f64] {
        &self.samples_j
    }

    /// Build the end-of-run report.
    ///
    /// # Parameters
    ///
    /// * `battery_capacity_j` - Usable battery energy
    /// * `send_interval_s` - Seconds between two transmissions of one device
    /// * `bytes_received` - Payload bytes delivered to the collection point
    ///
    /// # Returns
    ///
    /// `None` when nothing was transmitted, so no figure is ever NaN.
    pub fn report(&self, battery_capacity_j: f64, send_interval_s: f64, bytes_received: u64) -> Option<EnergyReport> {
        let per_transmission = SampleStats::from_samples(&self.samples_j)?;
        let mean = self.total_j / self.samples_j.len() as f64;
        let estimated_transmissions = battery_capacity_j / mean;
        let autonomy_hours = estimated_transmissions * send_interval_s / 3600.0;
        let energy_per_bit_mj = if bytes_received > 0 {
            Some(self.total_j * 1000.0 / bytes_received as f64 / 8.0)
        } else {
            None
        };
        Some(EnergyReport {
            transmissions: self.samples_j.len(),
            total_j: self.total_j,
            per_transmission,
            estimated_transmissions,
            autonomy_hours,
            energy_per_bit_mj,
        })
    }
}

impl Default for EnergyAccountant {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPLY_VOLTAGE)
    }
}
