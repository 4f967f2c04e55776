//! End-of-run summary: delivery ratio, latency, relay counters, throughput
//! and energy, as logged, appended to the results CSV and exported as JSON.

use serde::Serialize;
use std::io::{self, Write};

use super::context::SimulationContext;
use super::energy::EnergyReport;
use super::relay::RelayAttemptCounters;
use super::stats::SampleStats;
use crate::common::config::ScenarioConfig;

/// Column header of the results file. One row is appended per run.
pub const SUMMARY_CSV_HEADER: &str = "devices,gateways,spreading_factor,sim_time_s,packets_sent,packets_received,pdr_percent,latency_avg_ms,latency_min_ms,latency_max_ms,latency_stddev_ms,relay_attempts,relay_successes,relay_failures,relay_efficiency_percent";

/// Delivery rate at the collection point over the first-to-last reception span.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Throughput {
    pub span_s: f64,
    pub bits_per_second: f64,
    pub kilobits_per_second: f64,
    pub packets_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub devices: u32,
    pub gateways: u32,
    pub spreading_factor: u8,
    pub sim_time_s: f64,
    pub peer_relay_enabled: bool,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub pdr_percent: f64,
    pub latency_ms: Option<SampleStats>,
    pub unmatched_receptions: u64,
    pub evicted_pending: u64,
    pub relay: RelayAttemptCounters,
    pub relay_efficiency_percent: f64,
    pub throughput: Option<Throughput>,
    pub energy: Option<EnergyReport>,
}

impl RunSummary {
    pub fn from_context(config: &ScenarioConfig, ctx: &SimulationContext) -> Self {
        let packets_received = ctx.throughput.packets_received;
        let bytes_received = ctx.throughput.bytes_received;
        let pdr_percent = if ctx.packets_sent > 0 {
            packets_received as f64 / ctx.packets_sent as f64 * 100.0
        } else {
            0.0
        };
        let throughput = ctx.throughput.span_s().map(|span_s| {
            let bits_per_second = bytes_received as f64 * 8.0 / span_s;
            Throughput {
                span_s,
                bits_per_second,
                kilobits_per_second: bits_per_second / 1000.0,
                packets_per_second: packets_received as f64 / span_s,
            }
        });
        let relay = ctx.relay.counters();

        Self {
            devices: config.devices,
            gateways: config.gateways,
            spreading_factor: config.spreading_factor,
            sim_time_s: config.sim_time_s,
            peer_relay_enabled: config.enable_p2p,
            packets_sent: ctx.packets_sent,
            packets_received,
            bytes_received,
            pdr_percent,
            latency_ms: ctx.latency.stats(),
            unmatched_receptions: ctx.latency.unmatched(),
            evicted_pending: ctx.latency.evicted(),
            relay,
            relay_efficiency_percent: relay.efficiency_percent(),
            throughput,
            energy: ctx.energy.report(config.energy.battery_capacity_j, config.send_interval_s, bytes_received),
        }
    }

    /// One results row matching `SUMMARY_CSV_HEADER`. Latency columns are
    /// zero when nothing was delivered.
    pub fn write_csv_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let (avg, min, max, std_dev) = self.latency_ms.map_or((0.0, 0.0, 0.0, 0.0), |l| (l.mean, l.min, l.max, l.std_dev));
        writeln!(
            w,
            "{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{},{},{},{:.2}",
            self.devices,
            self.gateways,
            self.spreading_factor,
            self.sim_time_s,
            self.packets_sent,
            self.packets_received,
            self.pdr_percent,
            avg,
            min,
            max,
            std_dev,
            self.relay.attempts,
            self.relay.successes,
            self.relay.failures,
            self.relay_efficiency_percent
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Print the summary to the log at info level.
    pub fn log_report(&self) {
        log::info!("=== Simulation results ===");
        log::info!(
            "Devices: {}, gateways: {}, SF{}, {} s, peer relay {}",
            self.devices,
            self.gateways,
            self.spreading_factor,
            self.sim_time_s,
            if self.peer_relay_enabled { "enabled" } else { "disabled" }
        );
        log::info!("Packets sent: {}, received: {}, PDR: {:.2}%", self.packets_sent, self.packets_received, self.pdr_percent);

        match &self.latency_ms {
            Some(l) => log::info!(
                "Latency: avg {:.2} ms, min {:.2} ms, max {:.2} ms, stddev {:.2} ms ({} samples)",
                l.mean,
                l.min,
                l.max,
                l.std_dev,
                l.count
            ),
            None => log::info!("Latency: no packet delivered"),
        }
        if self.unmatched_receptions > 0 || self.evicted_pending > 0 {
            log::info!("Uncorrelated receptions: {}, evicted pending sends: {}", self.unmatched_receptions, self.evicted_pending);
        }

        if self.peer_relay_enabled {
            log::info!(
                "Relay attempts: {}, successes: {}, failures: {}, efficiency: {:.2}%, TTL drops: {}",
                self.relay.attempts,
                self.relay.successes,
                self.relay.failures,
                self.relay_efficiency_percent,
                self.relay.ttl_dropped
            );
        }

        match &self.throughput {
            Some(t) => log::info!(
                "Throughput: {:.2} bps ({:.3} kbps), {:.4} packets/s over {:.1} s",
                t.bits_per_second,
                t.kilobits_per_second,
                t.packets_per_second,
                t.span_s
            ),
            None => log::info!("Throughput: not enough receptions to measure"),
        }

        match &self.energy {
            Some(e) => {
                log::info!(
                    "Energy: {} transmissions, total {:.4} J, per transmission avg {:.6} J (min {:.6}, max {:.6}, stddev {:.6})",
                    e.transmissions,
                    e.total_j,
                    e.per_transmission.mean,
                    e.per_transmission.min,
                    e.per_transmission.max,
                    e.per_transmission.std_dev
                );
                log::info!("Battery: {:.0} transmissions, autonomy {:.1} h", e.estimated_transmissions, e.autonomy_hours);
                if let Some(per_bit) = e.energy_per_bit_mj {
                    log::info!("Energy per delivered bit: {:.6} mJ", per_bit);
                }
            }
            None => log::info!("Energy: no transmissions"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::SimTime;

    fn context_with_traffic() -> (ScenarioConfig, SimulationContext) {
        let config = ScenarioConfig {
            devices: 2,
            gateways: 1,
            sim_time_s: 120.0,
            ..ScenarioConfig::default()
        };
        let mut ctx = SimulationContext::new(&config);
        for (send_s, receive_ms) in [(0u64, 40u64), (60, 60_100)] {
            let id = ctx.next_packet_id();
            ctx.packets_sent += 1;
            ctx.latency.on_send(id, SimTime::from_secs(send_s));
            ctx.energy.energy_for_transmission(7, 14.0, 20);
            let at = SimTime::from_micros(receive_ms * 1000);
            ctx.latency.on_receive(id, at);
            ctx.throughput.record(20, at);
        }
        let id = ctx.next_packet_id();
        ctx.packets_sent += 1;
        ctx.latency.on_send(id, SimTime::from_secs(100));
        ctx.energy.energy_for_transmission(7, 14.0, 20);
        (config, ctx)
    }

    #[test]
    fn summary_figures() {
        let (config, ctx) = context_with_traffic();
        let s = RunSummary::from_context(&config, &ctx);
        assert_eq!((s.packets_sent, s.packets_received, s.bytes_received), (3, 2, 40));
        assert!((s.pdr_percent - 200.0 / 3.0).abs() < 1e-9);
        let latency = s.latency_ms.unwrap();
        assert!((latency.mean - 70.0).abs() < 1e-9);
        assert_eq!(latency.min, 40.0);
        assert_eq!(latency.max, 100.0);

        let t = s.throughput.unwrap();
        assert!((t.span_s - 60.06).abs() < 1e-9);
        assert!((t.bits_per_second - 320.0 / 60.06).abs() < 1e-9);
        assert!((t.kilobits_per_second * 1000.0 - t.bits_per_second).abs() < 1e-9);

        let e = s.energy.unwrap();
        assert_eq!(e.transmissions, 3);
        assert!(e.energy_per_bit_mj.is_some());
    }

    #[test]
    fn empty_run_has_no_nan() {
        let config = ScenarioConfig::default();
        let ctx = SimulationContext::new(&config);
        let s = RunSummary::from_context(&config, &ctx);
        assert_eq!(s.pdr_percent, 0.0);
        assert_eq!(s.relay_efficiency_percent, 0.0);
        assert!(s.latency_ms.is_none() && s.throughput.is_none() && s.energy.is_none());

        let mut out = Vec::new();
        s.write_csv_row(&mut out).unwrap();
        let row = String::from_utf8(out).unwrap();
        assert!(!row.contains("NaN"));
        assert_eq!(row, "50,10,7,600,0,0,0.00,0.00,0.00,0.00,0.00,0,0,0,0.00\n");
    }

    #[test]
    fn csv_row_matches_header() {
        let (config, ctx) = context_with_traffic();
        let s = RunSummary::from_context(&config, &ctx);
        let mut out = Vec::new();
        s.write_csv_row(&mut out).unwrap();
        let row = String::from_utf8(out).unwrap();
        assert_eq!(row.trim_end().split(',').count(), SUMMARY_CSV_HEADER.split(',').count());
        assert!(row.starts_with("2,1,7,120,3,2,66.67,70.00,40.00,100.00,30.00,"));
    }

    #[test]
    fn json_carries_every_section() {
        let (config, ctx) = context_with_traffic();
        let json = RunSummary::from_context(&config, &ctx).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["packets_received"], 2);
        assert_eq!(value["relay"]["ttl_dropped"], 0);
        assert!(value["latency_ms"]["std_dev"].is_number());
        assert!(value["energy"]["autonomy_hours"].is_number());
        assert!(value["throughput"]["packets_per_second"].is_number());
    }
}
