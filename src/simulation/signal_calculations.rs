//! Radio signal and timing calculations.
//!
//! Contains helpers for:
//! - Log-distance RSSI estimates used when ranking relay candidates
//! - SX1276-style time-on-air for a LoRa uplink
//! - Transmit current draw as a step function of output power
//!
//! Units:
//! - Power: dBm
//! - Time: seconds (f64)
//! - Distance: meters
//! - Current: mA

/// Transmit power assumed for every relay candidate when estimating RSSI.
pub const RELAY_TX_POWER_DBM: f64 = 14.0;

/// Channel bandwidth of the uplink (Hz).
pub const BANDWIDTH_HZ: f64 = 125_000.0;

/// Coding rate 4/5, applied as a multiplier on the payload symbol blocks.
pub const CODING_RATE: f64 = 4.0 / 5.0;

/// Preamble symbols plus the fixed 4.25 symbol sync word.
const PREAMBLE_SYMBOLS: f64 = 8.0 + 4.25;

/// Parameters of the simplified log-distance model used for relay RSSI.
///
/// Unlike a full link budget there is no shadowing, no noise floor and no
/// antenna gain: the estimate only needs to order neighbors consistently.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RssiModel {
    /// Path loss exponent (n). 2.0 for free space; over water slightly above.
    pub path_loss_exponent: f64,
    /// Path loss at the reference distance in dB.
    pub reference_loss_db: f64,
    /// Reference distance d₀ in meters. Shorter distances are clamped to it.
    pub reference_distance_m: f64,
}

impl RssiModel {
    /// Constants of the over-water propagation model.
    pub const fn over_water() -> Self {
        Self {
            path_loss_exponent: 2.2,
            reference_loss_db: 7.7,
            reference_distance_m: 1000.0,
        }
    }
}

impl Default for RssiModel {
    fn default() -> Self {
        Self::over_water()
    }
}

/// Path loss in dB at `distance_m`.
///
/// # Formula
///
/// ```text
/// PL(d) = PL(d₀) + 10 × n × log₁₀(d / d₀),   d = max(d, d₀)
/// ```
pub fn calculate_path_loss(distance_m: f64, model: &RssiModel) -> f64 {
    let d = distance_m.max(model.reference_distance_m);
    model.reference_loss_db + 10.0 * model.path_loss_exponent * (d / model.reference_distance_m).log10()
}

/// Estimated RSSI (dBm) of a transmitter `distance_m` away.
///
/// Formula: RSSI(dBm) = P_tx(dBm) - PL(dB). Deterministic, and monotonically
/// non-increasing in distance.
pub fn estimate_rssi(distance_m: f64, tx_power_dbm: f64, model: &RssiModel) -> f64 {
    tx_power_dbm - calculate_path_loss(distance_m, model)
}

/// LoRa symbol duration in seconds: `T_sym = 2^SF / BW`.
pub fn symbol_time(spreading_factor: u8) -> f64 {
    2.0_f64.powi(spreading_factor as i32) / BANDWIDTH_HZ
}

/// Number of payload symbols for an explicit-header packet with CRC.
///
/// ```text
/// N = 8 + max(ceil((8·PL − 4·SF + 28 + 16) / (4·SF)) · CR, 0)
/// ```
///
/// `CR` is the 4/5 coding rate as a fraction, which gives fractional symbol
/// counts.
pub fn payload_symbols(spreading_factor: u8, payload_bytes: usize) -> f64 {
    let sf = spreading_factor as f64;
    let pl = payload_bytes as f64;
    let blocks = ((8.0 * pl - 4.0 * sf + 28.0 + 16.0) / (4.0 * sf)).ceil();
    8.0 + (blocks * CODING_RATE).max(0.0)
}

/// Time on air of one uplink, in seconds.
pub fn calculate_air_time(spreading_factor: u8, payload_bytes: usize) -> f64 {
    let t_sym = symbol_time(spreading_factor);
    let preamble_time = PREAMBLE_SYMBOLS * t_sym;
    preamble_time + payload_symbols(spreading_factor, payload_bytes) * t_sym
}

/// Transmit current (mA) of an SX1276-class radio at the given output power.
pub fn transmit_current_ma(tx_power_dbm: f64) -> f64 {
    if tx_power_dbm <= 2.0 {
        22.0
    } else if tx_power_dbm <= 5.0 {
        24.0
    } else if tx_power_dbm <= 8.0 {
        28.0
    } else if tx_power_dbm <= 11.0 {
        33.0
    } else if tx_power_dbm <= 14.0 {
        44.0
    } else {
        // PA_BOOST path
        120.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rssi_clamps_below_reference_distance() {
        let m = RssiModel::over_water();
        let at_ref = estimate_rssi(1000.0, 14.0, &m);
        assert!((at_ref - (14.0 - 7.7)).abs() < 1e-12);
        assert_eq!(estimate_rssi(10.0, 14.0, &m), at_ref);
        assert_eq!(estimate_rssi(0.0, 14.0, &m), at_ref);
    }

    #[test]
    fn rssi_non_increasing_with_distance() {
        let m = RssiModel::over_water();
        let mut previous = f64::INFINITY;
        let mut d = 1000.0;
        while d <= 20_000.0 {
            let rssi = estimate_rssi(d, 14.0, &m);
            assert!(rssi <= previous, "rssi rose at {} m", d);
            previous = rssi;
            d += 250.0;
        }
    }

    #[test]
    fn rssi_decade_costs_ten_n_db() {
        let m = RssiModel::over_water();
        let near = estimate_rssi(1000.0, 14.0, &m);
        let far = estimate_rssi(10_000.0, 14.0, &m);
        assert!((near - far - 22.0).abs() < 1e-9);
    }

    #[test]
    fn air_time_sf7_twenty_bytes() {
        // T_sym = 1.024 ms, 12.25 preamble + 13.6 payload symbols
        let t = calculate_air_time(7, 20);
        assert!((t - 0.0264704).abs() < 1e-9);
    }

    #[test]
    fn air_time_increases_with_payload_and_sf() {
        let t_small = calculate_air_time(7, 10);
        let t_big = calculate_air_time(7, 100);
        assert!(t_big > t_small);
        let t_sf9 = calculate_air_time(9, 10);
        assert!(t_sf9 > t_small);
    }

    #[test]
    fn payload_symbols_never_below_header() {
        // Tiny payload at high SF gives a non-positive block count.
        assert_eq!(payload_symbols(12, 0), 8.0);
    }

    #[test]
    fn transmit_current_steps() {
        for (p, ma) in [(0.0, 22.0), (2.0, 22.0), (5.0, 24.0), (8.0, 28.0), (11.0, 33.0), (14.0, 44.0), (14.5, 120.0), (20.0, 120.0)] {
            assert_eq!(transmit_current_ma(p), ma, "at {} dBm", p);
        }
    }
}
