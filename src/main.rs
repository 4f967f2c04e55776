//! Maritime relay simulator.
//!
//! Runs a scenario of boats, mobile gateways and a collection point, writes
//! the position and coverage logs, appends one row per run to the results
//! file and optionally exports the run summaries as JSON.

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

mod common;
mod simulation;

use common::config::{ConfigError, ScenarioConfig, validate_scenario};
use common::csv_log::CsvLog;
use simulation::{RunSummary, SUMMARY_CSV_HEADER, Scenario, SimulationContext, open_sinks};

/// Maritime LoRa relay simulator
#[derive(Parser, Debug)]
#[command(name = "maritime-relay-simulator")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Scenario TOML file. Built-in defaults apply to anything it leaves out.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Number of boats (overrides config file)
    #[arg(long)]
    devices: Option<u32>,
    /// Number of mobile gateways (overrides config file)
    #[arg(long)]
    gateways: Option<u32>,
    /// Spreading factor (7-12) (overrides config file)
    #[arg(long)]
    sf: Option<u8>,
    /// TX power in dBm (overrides config file)
    #[arg(long)]
    tx_power: Option<f64>,
    /// Simulated time in seconds (overrides config file)
    #[arg(long)]
    sim_time: Option<f64>,
    /// Enable opportunistic peer relay
    #[arg(long)]
    p2p: bool,
    /// Random seed (overrides config file)
    #[arg(long)]
    seed: Option<u64>,
    /// Directory for the CSV outputs (overrides config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Output file name prefix (overrides config file)
    #[arg(long)]
    label: Option<String>,
    /// Independent runs; run n uses the configured seed plus n
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    runs: u32,
    /// Also write the run summary as JSON to this path (an array for several runs)
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,
    /// Debug logging for the simulator
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(devices) = self.devices {
            config.devices = devices;
        }
        if let Some(gateways) = self.gateways {
            config.gateways = gateways;
        }
        if let Some(sf) = self.sf {
            config.spreading_factor = sf;
        }
        if let Some(tx_power) = self.tx_power {
            config.tx_power_dbm = tx_power;
        }
        if let Some(sim_time) = self.sim_time {
            config.sim_time_s = sim_time;
        }
        if self.p2p {
            config.enable_p2p = true;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(label) = &self.label {
            config.label = label.clone();
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    if verbose {
        builder.filter(Some("maritime_relay_simulator"), LevelFilter::Debug);
    }
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            record.level(),
            record.args()
        )
    });
    builder.init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => ScenarioConfig::load(path).with_context(|| format!("Failed to load scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };
    cli.apply_overrides(&mut config);
    validate_scenario(&config).map_err(ConfigError::ValidationError)?;

    info!("Starting up");
    info!(
        "Scenario '{}': SF{}, {} dBm, {} byte payload every {} s",
        config.label, config.spreading_factor, config.tx_power_dbm, config.payload_bytes, config.send_interval_s
    );

    let runs: Vec<ScenarioConfig> = if cli.runs == 1 {
        vec![config.clone()]
    } else {
        (0..cli.runs).map(|run| config.for_run(run)).collect()
    };

    // Open every sink before the first run starts
    fs::create_dir_all(&config.output_dir).with_context(|| format!("Failed to create output directory {}", config.output_dir.display()))?;
    let mut sinks = Vec::with_capacity(runs.len());
    for run_config in &runs {
        sinks.push(open_sinks(run_config)?);
    }
    let mut results = CsvLog::append_with_header(&config.results_path(), SUMMARY_CSV_HEADER)?;

    let mut ctx = SimulationContext::new(&runs[0]);
    let mut summaries = Vec::with_capacity(runs.len());
    for (n, (run_config, (positions, coverage))) in runs.iter().zip(sinks).enumerate() {
        if n > 0 {
            ctx.reset(run_config.seed);
            info!("Run {} of {} (seed {})", n + 1, runs.len(), run_config.seed);
        }
        let mut scenario = Scenario::new(run_config, &mut ctx, positions, coverage);
        scenario.run(&mut ctx).context("Simulation output failed")?;

        let summary = RunSummary::from_context(run_config, &ctx);
        summary.log_report();
        results.write_with(|w| summary.write_csv_row(w))?;
        summaries.push(summary);
    }

    results.flush()?;
    info!("{} result row(s) appended to {}", summaries.len(), results.path().display());

    if let Some(path) = &cli.summary_json {
        let json = match summaries.as_slice() {
            [summary] => summary.to_json(),
            all => serde_json::to_string_pretty(all),
        }
        .context("Failed to serialize run summary")?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    Ok(())
}
