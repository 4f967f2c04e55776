//! Maritime relay simulation core.
//!
//! Field devices ("boats") send periodic uplinks that mobile gateways forward
//! to a single collection point. When no gateway hears a device, an
//! opportunistic peer relay attempt is made through a nearby device. This
//! module measures what happens:
//! - End-to-end latency by correlating sends with receptions
//! - Gateway coverage sampled at a fixed interval
//! - Energy per transmission and the resulting battery autonomy
//! - Relay attempt counters from both relay triggers
//!
//! ## Module Organization
//!
//! - `types`: Node ids, positions and virtual time
//! - `geometry`: Distance queries
//! - `signal_calculations`: RSSI estimate, time-on-air, transmit current
//! - `neighbor_table`: Per-node visible neighbors
//! - `relay`: Relay selection, outcome policy and the periodic sweep
//! - `latency`, `coverage`, `energy`, `stats`: Measurement pipeline
//! - `context`: All mutable state of one run
//! - `scheduler`: Virtual-time event queue and periodic tickers
//! - `mobility`, `scenario`: Reference scenario driver
//! - `summary`: End-of-run report
//!
//! ## Public API
//!
//! Build a `SimulationContext` from a `ScenarioConfig`, hand it to a
//! `Scenario` together with the output sinks, call `run`, then turn the
//! context into a `RunSummary`.

pub mod context;
pub mod coverage;
pub mod energy;
pub mod geometry;
pub mod latency;
pub mod mobility;
pub mod neighbor_table;
pub mod relay;
pub mod scenario;
pub mod scheduler;
pub mod signal_calculations;
pub mod stats;
pub mod summary;
pub mod types;

pub use context::SimulationContext;
pub use scenario::{Scenario, open_sinks};
pub use summary::{RunSummary, SUMMARY_CSV_HEADER};
