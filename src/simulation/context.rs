//! Process-wide state of one simulation run.
//!
//! Everything a handler may update lives here and is passed around by
//! `&mut`: the peer relay (tables and counters), the latency correlator, the
//! energy accountant, the throughput counters and the packet id sequence.
//! A new run either builds a fresh context or calls `reset`.

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::energy::EnergyAccountant;
use super::latency::{LatencyCorrelator, PacketId};
use super::relay::{PeerRelay, RelaySettings, UniformThreshold};
use super::signal_calculations::RssiModel;
use super::types::SimTime;
use crate::common::config::ScenarioConfig;

// Seed offsets of the relay random streams
const OUTCOME_STREAM: u64 = 0x5eed_0001;
const SWEEP_STREAM: u64 = 0x5eed_0002;

/// Deliveries at the collection point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputCounters {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub first_reception: Option<SimTime>,
    pub last_reception: Option<SimTime>,
}

impl ThroughputCounters {
    pub fn record(&mut self, bytes: usize, time: SimTime) {
        self.packets_received += 1;
        self.bytes_received += bytes as u64;
        if self.first_reception.is_none() {
            self.first_reception = Some(time);
        }
        self.last_reception = Some(time);
    }

    /// Seconds between the first and the last reception, `None` unless positive.
    pub fn span_s(&self) -> Option<f64> {
        let (first, last) = (self.first_reception?, self.last_reception?);
        let span = last.saturating_since(first).as_secs_f64();
        (span > 0.0).then_some(span)
    }
}

pub struct SimulationContext {
    pub relay: PeerRelay,
    pub latency: LatencyCorrelator,
    pub energy: EnergyAccountant,
    pub throughput: ThroughputCounters,
    pub packets_sent: u64,
    next_packet_id: PacketId,
    supply_voltage: f64,
    relay_settings: RelaySettings,
    success_probability: f64,
    seed: u64,
}

impl SimulationContext {
    pub fn new(config: &ScenarioConfig) -> Self {
        let relay_settings = RelaySettings {
            failure_range_m: config.relay.failure_range_m,
            proactive_range_m: config.relay.proactive_range_m,
            sweep_fraction: config.relay.sweep_fraction,
        };
        let success_probability = config.relay.success_probability;
        let seed = config.seed;
        Self {
            relay: Self::build_relay(relay_settings, success_probability, seed),
            latency: LatencyCorrelator::new(),
            energy: EnergyAccountant::new(config.energy.supply_voltage),
            throughput: ThroughputCounters::default(),
            packets_sent: 0,
            next_packet_id: 0,
            supply_voltage: config.energy.supply_voltage,
            relay_settings,
            success_probability,
            seed,
        }
    }

    fn build_relay(settings: RelaySettings, success_probability: f64, seed: u64) -> PeerRelay {
        let outcome = UniformThreshold::new(success_probability, StdRng::seed_from_u64(seed ^ OUTCOME_STREAM));
        PeerRelay::new(settings, RssiModel::over_water(), Box::new(outcome), StdRng::seed_from_u64(seed ^ SWEEP_STREAM))
    }

    /// Hand out the next packet id. Ids are never reused within a run.
    pub fn next_packet_id(&mut self) -> PacketId {
        let id = self.next_packet_id;
        self.next_packet_id += 1;
        id
    }

    /// Drop every counter, sample and table so the context can serve a new
    /// run. The relay random streams restart from `seed`.
    pub fn reset(&mut self, seed: u64) {
        self.seed = seed;
        self.relay = Self::build_relay(self.relay_settings, self.success_probability, self.seed);
        self.latency = LatencyCorrelator::new();
        self.energy = EnergyAccountant::new(self.supply_voltage);
        self.throughput = ThroughputCounters::default();
        self.packets_sent = 0;
        self.next_packet_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::relay::RelayAttemptCounters;
    use crate::simulation::types::Position;

    #[test]
    fn packet_ids_are_unique_and_monotonic() {
        let mut ctx = SimulationContext::new(&ScenarioConfig::default());
        let ids: Vec<PacketId> = (0..5).map(|_| ctx.next_packet_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn reset_clears_run_state() {
        let mut ctx = SimulationContext::new(&ScenarioConfig::default());
        ctx.relay.install([0]);
        ctx.relay.attempt_relay(0);
        let id = ctx.next_packet_id();
        ctx.latency.on_send(id, SimTime::ZERO);
        ctx.energy.energy_for_transmission(7, 14.0, 20);
        ctx.throughput.record(20, SimTime::from_secs(1));
        ctx.packets_sent = 1;

        ctx.reset(7);

        assert_eq!(ctx.relay.counters(), RelayAttemptCounters::default());
        assert!(ctx.relay.tables().is_empty());
        assert_eq!(ctx.latency.pending_len(), 0);
        assert_eq!(ctx.energy.transmissions(), 0);
        assert_eq!(ctx.throughput, ThroughputCounters::default());
        assert_eq!(ctx.packets_sent, 0);
        assert_eq!(ctx.next_packet_id(), 0);
    }

    #[test]
    fn reset_with_the_same_seed_replays_relay_draws() {
        let config = ScenarioConfig::default();
        let mut ctx = SimulationContext::new(&config);
        let devices: Vec<_> = (0..50).map(|id| (id, Some(Position::new(id as f64 * 100.0, 0.0)))).collect();
        let first = ctx.relay.run_sweep(&devices);

        assert!(first.selected > 0);

        ctx.reset(config.seed);
        assert_eq!(ctx.relay.run_sweep(&devices), first);
        assert_eq!(ctx.relay.counters().attempts, first.selected as u64);
    }

    #[test]
    fn throughput_span_needs_two_distinct_instants() {
        let mut t = ThroughputCounters::default();
        assert_eq!(t.span_s(), None);
        t.record(23, SimTime::from_secs(10));
        assert_eq!(t.span_s(), None);
        t.record(23, SimTime::from_secs(70));
        assert_eq!(t.span_s(), Some(60.0));
        assert_eq!((t.packets_received, t.bytes_received), (2, 46));
    }
}
