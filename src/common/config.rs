//! Scenario configuration loading.
//!
//! A scenario is described by a TOML file with kebab-case keys. Every field
//! has a default, so an empty file (or no file at all) describes the
//! reference 50-boat, 10-gateway run. Command line flags override the loaded
//! values before validation.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::simulation::coverage::{DEFAULT_MAX_RANGE_M, DEFAULT_SAMPLE_INTERVAL};
use crate::simulation::energy::{DEFAULT_BATTERY_CAPACITY_J, DEFAULT_SUPPLY_VOLTAGE};

const MAX_DEVICES: u32 = 100_000;
const MAX_GATEWAYS: u32 = 10_000;
const MIN_SPREADING_FACTOR: u8 = 7;
const MAX_SPREADING_FACTOR: u8 = 12;
// LoRa PHY payload limit
const MAX_PAYLOAD_BYTES: usize = 255;

#[derive(Debug)]
pub enum ConfigError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Peer relay parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RelayConfig {
    /// Probability that a relay attempt with a candidate succeeds.
    pub success_probability: f64,
    /// Share of devices the periodic sweep assumes to need a relay.
    pub sweep_fraction: f64,
    pub sweep_interval_s: f64,
    /// Neighborhood used after a failed transmission and by the sweep (m).
    pub failure_range_m: f64,
    /// Neighborhood used by beacon-driven table maintenance (m).
    pub proactive_range_m: f64,
    pub beacon_interval_s: f64,
    /// First beacon of device `i` is sent at `beacon_offset_s + i * beacon_stagger_s`.
    pub beacon_offset_s: f64,
    pub beacon_stagger_s: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            success_probability: 0.8,
            sweep_fraction: 0.2,
            sweep_interval_s: 120.0,
            failure_range_m: 3000.0,
            proactive_range_m: 5000.0,
            beacon_interval_s: 30.0,
            beacon_offset_s: 30.0,
            beacon_stagger_s: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CoverageConfig {
    pub interval_s: f64,
    /// A gateway hears a device up to this distance (m).
    pub max_range_m: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            interval_s: DEFAULT_SAMPLE_INTERVAL.as_secs_f64(),
            max_range_m: DEFAULT_MAX_RANGE_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EnergyConfig {
    pub battery_capacity_j: f64,
    pub supply_voltage: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            battery_capacity_j: DEFAULT_BATTERY_CAPACITY_J,
            supply_voltage: DEFAULT_SUPPLY_VOLTAGE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LatencyConfig {
    /// Pending sends older than this are dropped at every coverage tick.
    /// Unset keeps them for the whole run.
    pub pending_horizon_s: Option<f64>,
}

/// Complete description of one simulation run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScenarioConfig {
    pub devices: u32,
    pub gateways: u32,
    pub spreading_factor: u8,
    pub tx_power_dbm: f64,
    pub sim_time_s: f64,
    pub enable_p2p: bool,
    pub seed: u64,
    pub payload_bytes: usize,
    pub send_interval_s: f64,
    pub area_width_m: f64,
    pub area_height_m: f64,
    pub device_speed_mps: f64,
    pub gateway_speed_mps: f64,
    pub walk_step_s: f64,
    pub backhaul_delay_ms: f64,
    pub output_dir: PathBuf,
    /// Prefix of every output file name.
    pub label: String,
    pub relay: RelayConfig,
    pub coverage: CoverageConfig,
    pub energy: EnergyConfig,
    pub latency: LatencyConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            devices: 50,
            gateways: 10,
            spreading_factor: 7,
            tx_power_dbm: 14.0,
            sim_time_s: 600.0,
            enable_p2p: false,
            seed: 1,
            payload_bytes: 23,
            send_interval_s: 60.0,
            area_width_m: 25_000.0,
            area_height_m: 15_000.0,
            device_speed_mps: 5.0,
            gateway_speed_mps: 6.0,
            walk_step_s: 1.0,
            backhaul_delay_ms: 2.0,
            output_dir: PathBuf::from("."),
            label: "salinas".to_string(),
            relay: RelayConfig::default(),
            coverage: CoverageConfig::default(),
            energy: EnergyConfig::default(),
            latency: LatencyConfig::default(),
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a TOML file. Validation is left to the caller so
    /// that command line overrides can be applied first.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn positions_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_positions.csv", self.label))
    }

    pub fn coverage_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_coverage.csv", self.label))
    }

    /// Summary file; runs with peer relay write to a separate `_p2p` file.
    pub fn results_path(&self) -> PathBuf {
        let suffix = if self.enable_p2p { "_p2p" } else { "" };
        self.output_dir.join(format!("{}_results{}.csv", self.label, suffix))
    }

    /// Settings of run `run` in a batch: the seed advances by the run index
    /// and the position and coverage logs get a `_run<n>` label suffix. The
    /// results file stays shared.
    pub fn for_run(&self, run: u32) -> Self {
        Self {
            seed: self.seed.wrapping_add(u64::from(run)),
            label: format!("{}_run{}", self.label, run),
            ..self.clone()
        }
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be a positive number, got {}", name, value));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must not be negative, got {}", name, value));
    }
    Ok(())
}

fn check_fraction(name: &str, value: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("{} must be within 0..=1, got {}", name, value));
    }
    Ok(())
}

/// Validate a scenario after all overrides were applied.
///
/// # Returns
///
/// * `Ok(())` if the scenario can be run
/// * `Err(String)` describing the first offending value
pub fn validate_scenario(config: &ScenarioConfig) -> Result<(), String> {
    if config.devices > MAX_DEVICES {
        return Err(format!("Device count {} exceeds maximum of {}", config.devices, MAX_DEVICES));
    }
    if config.gateways > MAX_GATEWAYS {
        return Err(format!("Gateway count {} exceeds maximum of {}", config.gateways, MAX_GATEWAYS));
    }
    if !(MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR).contains(&config.spreading_factor) {
        return Err(format!(
            "Spreading factor {} is outside {}-{}",
            config.spreading_factor, MIN_SPREADING_FACTOR, MAX_SPREADING_FACTOR
        ));
    }
    if !config.tx_power_dbm.is_finite() {
        return Err("tx-power-dbm must be a finite number".to_string());
    }
    if config.payload_bytes > MAX_PAYLOAD_BYTES {
        return Err(format!("Payload of {} bytes exceeds maximum of {}", config.payload_bytes, MAX_PAYLOAD_BYTES));
    }
    if config.label.is_empty() {
        return Err("label must not be empty".to_string());
    }

    check_positive("sim-time-s", config.sim_time_s)?;
    check_positive("send-interval-s", config.send_interval_s)?;
    check_positive("area-width-m", config.area_width_m)?;
    check_positive("area-height-m", config.area_height_m)?;
    check_positive("walk-step-s", config.walk_step_s)?;
    check_non_negative("device-speed-mps", config.device_speed_mps)?;
    check_non_negative("gateway-speed-mps", config.gateway_speed_mps)?;
    check_non_negative("backhaul-delay-ms", config.backhaul_delay_ms)?;

    let relay = &config.relay;
    check_fraction("relay.success-probability", relay.success_probability)?;
    check_fraction("relay.sweep-fraction", relay.sweep_fraction)?;
    check_positive("relay.sweep-interval-s", relay.sweep_interval_s)?;
    check_positive("relay.failure-range-m", relay.failure_range_m)?;
    check_positive("relay.proactive-range-m", relay.proactive_range_m)?;
    check_positive("relay.beacon-interval-s", relay.beacon_interval_s)?;
    check_non_negative("relay.beacon-offset-s", relay.beacon_offset_s)?;
    check_non_negative("relay.beacon-stagger-s", relay.beacon_stagger_s)?;

    check_positive("coverage.interval-s", config.coverage.interval_s)?;
    check_positive("coverage.max-range-m", config.coverage.max_range_m)?;
    check_positive("energy.battery-capacity-j", config.energy.battery_capacity_j)?;
    check_positive("energy.supply-voltage", config.energy.supply_voltage)?;
    if let Some(horizon) = config.latency.pending_horizon_s {
        check_positive("latency.pending-horizon-s", horizon)?;
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_reference_scenario() {
        let config = ScenarioConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(config.devices, 50);
        assert_eq!(config.gateways, 10);
        assert_eq!(config.relay.success_probability, 0.8);
        assert_eq!(config.coverage.max_range_m, 15_000.0);
        assert_eq!(config.energy.battery_capacity_j, 34_632.0);
        assert_eq!(config.latency.pending_horizon_s, None);
        assert!(validate_scenario(&config).is_ok());
    }

    #[test]
    fn kebab_case_keys_and_nested_tables() {
        let config = ScenarioConfig::from_toml_str(
            r#"
            devices = 20
            spreading-factor = 9
            enable-p2p = true
            label = "bay"

            [relay]
            failure-range-m = 2500.0

            [latency]
            pending-horizon-s = 300.0
            "#,
        )
        .unwrap();
        assert_eq!(config.devices, 20);
        assert_eq!(config.spreading_factor, 9);
        assert!(config.enable_p2p);
        assert_eq!(config.relay.failure_range_m, 2500.0);
        // Unspecified nested values keep their defaults
        assert_eq!(config.relay.proactive_range_m, 5000.0);
        assert_eq!(config.latency.pending_horizon_s, Some(300.0));
    }

    #[test]
    fn unknown_types_are_parse_errors() {
        let err = ScenarioConfig::from_toml_str("devices = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ScenarioConfig::load(Path::new("/nonexistent/scenario.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_sf = ScenarioConfig {
            spreading_factor: 6,
            ..ScenarioConfig::default()
        };
        assert!(validate_scenario(&bad_sf).unwrap_err().contains("Spreading factor"));

        let mut bad_prob = ScenarioConfig::default();
        bad_prob.relay.success_probability = 1.5;
        assert!(validate_scenario(&bad_prob).is_err());

        let bad_time = ScenarioConfig {
            sim_time_s: 0.0,
            ..ScenarioConfig::default()
        };
        assert!(validate_scenario(&bad_time).is_err());

        let mut bad_horizon = ScenarioConfig::default();
        bad_horizon.latency.pending_horizon_s = Some(-1.0);
        assert!(validate_scenario(&bad_horizon).is_err());
    }

    #[test]
    fn zero_devices_is_a_valid_scenario() {
        let config = ScenarioConfig {
            devices: 0,
            ..ScenarioConfig::default()
        };
        assert!(validate_scenario(&config).is_ok());
    }

    #[test]
    fn output_file_names() {
        let mut config = ScenarioConfig {
            output_dir: PathBuf::from("out"),
            ..ScenarioConfig::default()
        };
        assert_eq!(config.positions_path(), PathBuf::from("out/salinas_positions.csv"));
        assert_eq!(config.coverage_path(), PathBuf::from("out/salinas_coverage.csv"));
        assert_eq!(config.results_path(), PathBuf::from("out/salinas_results.csv"));
        config.enable_p2p = true;
        assert_eq!(config.results_path(), PathBuf::from("out/salinas_results_p2p.csv"));
    }

    #[test]
    fn display_names_the_failing_stage() {
        let err = ConfigError::ValidationError("label must not be empty".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: label must not be empty");
    }

    #[test]
    fn batch_runs_get_their_own_seed_and_logs() {
        let base = ScenarioConfig::default();
        let run = base.for_run(2);
        assert_eq!(run.seed, base.seed + 2);
        assert_eq!(run.label, format!("{}_run2", base.label));
        assert_ne!(run.positions_path(), base.positions_path());
        assert_eq!(run.devices, base.devices);
    }
}
