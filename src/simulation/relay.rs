//! Opportunistic peer relay: candidate selection and attempt outcomes.
//!
//! Two independent triggers feed the same counters:
//! - the failure path (`on_transmission_failed`): a device whose uplink was
//!   not heard by any gateway rebuilds its neighbor table over the short
//!   fallback range, picks the strongest neighbor and tries to relay;
//! - the periodic sweep (`run_sweep`): a random share of all devices is
//!   assumed to need a relay; a plain proximity count over the other devices
//!   decides whether an attempt can happen at all. No table, no selection.
//!
//! Neither path models a forwarding exchange. Whether an attempt succeeds is
//! decided by a `RelayOutcomePolicy`, by default a fixed-probability coin
//! flip. This is an approximation of relay behavior, not a protocol.

use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};
use serde::Serialize;

use super::geometry::within_range;
use super::neighbor_table::{NeighborTable, NeighborTableManager};
use super::signal_calculations::RssiModel;
use super::types::{NodeId, Position, SimTime};

/// Decides whether a relay attempt that found a candidate succeeds.
pub trait RelayOutcomePolicy {
    fn relay_succeeds(&mut self) -> bool;
}

/// Draws `U[0, 1)` and succeeds when the draw is below `success_probability`.
pub struct UniformThreshold<R> {
    success_probability: f64,
    rng: R,
    unit: Uniform<f64>,
}

impl<R: Rng> UniformThreshold<R> {
    pub fn new(success_probability: f64, rng: R) -> Self {
        Self {
            success_probability,
            rng,
            unit: Uniform::new(0.0, 1.0),
        }
    }
}

impl<R: Rng> RelayOutcomePolicy for UniformThreshold<R> {
    fn relay_succeeds(&mut self) -> bool {
        self.unit.sample(&mut self.rng) < self.success_probability
    }
}

/// Run-wide relay counters. Monotonic until the owning context is reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayAttemptCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// No TTL is enforced, so this stays zero. Reported for completeness.
    pub ttl_dropped: u64,
}

impl RelayAttemptCounters {
    /// Successful attempts over all attempts, in percent.
    pub fn efficiency_percent(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64 * 100.0
    }
}

/// Result of a single relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayAttempt {
    /// Chosen relay, `None` when no candidate was available.
    pub relay: Option<NodeId>,
    pub success: bool,
}

/// What one periodic sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub selected: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// Selected devices without a known position.
    pub skipped: u32,
}

/// Ranges and rates of the relay subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaySettings {
    /// Neighborhood used when a transmission failed and by the sweep (m).
    pub failure_range_m: f64,
    /// Neighborhood used by proactive table maintenance (m).
    pub proactive_range_m: f64,
    /// Share of devices the sweep assumes to need a relay.
    pub sweep_fraction: f64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            failure_range_m: 3000.0,
            proactive_range_m: 5000.0,
            sweep_fraction: 0.2,
        }
    }
}

/// Sort a table strongest first; equal RSSI falls back to ascending id.
pub fn sort_by_rssi(table: &mut NeighborTable) {
    table.sort_by(|a, b| b.rssi.total_cmp(&a.rssi).then(a.neighbor_id.cmp(&b.neighbor_id)));
}

/// The strongest neighbor of `table`, `None` for an empty table.
///
/// The table is left sorted strongest first.
pub fn select_best_relay(table: &mut NeighborTable) -> Option<NodeId> {
    sort_by_rssi(table);
    table.first().map(|r| r.neighbor_id)
}

/// Peer relay state: neighbor tables, counters and the outcome policy.
pub struct PeerRelay {
    settings: RelaySettings,
    tables: NeighborTableManager,
    counters: RelayAttemptCounters,
    outcome: Box<dyn RelayOutcomePolicy>,
    sweep_rng: StdRng,
    unit: Uniform<f64>,
}

impl PeerRelay {
    pub fn new(settings: RelaySettings, rssi_model: RssiModel, outcome: Box<dyn RelayOutcomePolicy>, sweep_rng: StdRng) -> Self {
        Self {
            settings,
            tables: NeighborTableManager::new(rssi_model),
            counters: RelayAttemptCounters::default(),
            outcome,
            sweep_rng,
            unit: Uniform::new(0.0, 1.0),
        }
    }

    /// Create empty neighbor tables for the participating devices.
    pub fn install(&mut self, node_ids: impl IntoIterator<Item = NodeId>) {
        self.tables.install(node_ids);
    }

    pub fn counters(&self) -> RelayAttemptCounters {
        self.counters
    }

    #[cfg(test)]
    pub fn tables(&self) -> &NeighborTableManager {
        &self.tables
    }

    /// Attempt a relay through `owner`'s current neighbor table.
    ///
    /// Always counts an attempt. An empty or missing table fails without
    /// consulting the outcome policy; otherwise the policy is drawn once.
    pub fn attempt_relay(&mut self, owner: NodeId) -> RelayAttempt {
        self.counters.attempts += 1;

        let relay = self.tables.table_mut(owner).and_then(select_best_relay);
        let Some(relay_id) = relay else {
            self.counters.failures += 1;
            log::debug!("[{}] relay attempt failed: no neighbor", owner);
            return RelayAttempt { relay: None, success: false };
        };

        let success = self.outcome.relay_succeeds();
        if success {
            self.counters.successes += 1;
        } else {
            self.counters.failures += 1;
        }
        log::debug!("[{}] relay attempt via {}: {}", owner, relay_id, if success { "success" } else { "failure" });
        RelayAttempt { relay: Some(relay_id), success }
    }

    /// Failure-triggered relay: refresh over the fallback range, then attempt.
    ///
    /// # Parameters
    ///
    /// * `owner` - Device whose uplink no gateway received
    /// * `owner_position` - Its position, `None` when unknown
    /// * `all_positions` - Snapshot of every node that could act as relay
    /// * `now` - Current virtual time
    ///
    /// # Returns
    ///
    /// The attempt. An unknown owner position counts as a failed attempt.
    pub fn on_transmission_failed(&mut self, owner: NodeId, owner_position: Option<&Position>, all_positions: &[(NodeId, Position)], now: SimTime) -> RelayAttempt {
        let Some(position) = owner_position else {
            self.counters.attempts += 1;
            self.counters.failures += 1;
            log::debug!("[{}] relay attempt failed: position unknown", owner);
            return RelayAttempt { relay: None, success: false };
        };
        let range = self.settings.failure_range_m;
        self.tables.refresh(owner, position, all_positions, range, now);
        self.attempt_relay(owner)
    }

    /// Proactive table maintenance (beacon). Never touches the counters.
    pub fn refresh_proactive(&mut self, owner: NodeId, owner_position: &Position, all_positions: &[(NodeId, Position)], now: SimTime) -> usize {
        let range = self.settings.proactive_range_m;
        self.tables.refresh(owner, owner_position, all_positions, range, now).len()
    }

    /// Periodic statistical sweep over all field devices.
    ///
    /// Each device is picked with probability `sweep_fraction`. A picked
    /// device counts an attempt; without a position it is skipped with no
    /// outcome. Otherwise, if any other device with a known position is
    /// closer than the fallback range, the outcome policy decides, else the
    /// attempt fails.
    pub fn run_sweep(&mut self, devices: &[(NodeId, Option<Position>)]) -> SweepReport {
        let mut report = SweepReport::default();
        let range = self.settings.failure_range_m;

        for (i, (id, position)) in devices.iter().enumerate() {
            if self.unit.sample(&mut self.sweep_rng) >= self.settings.sweep_fraction {
                continue;
            }
            report.selected += 1;
            self.counters.attempts += 1;

            let Some(position) = position else {
                report.skipped += 1;
                continue;
            };

            let nearby = devices
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .filter_map(|(_, (_, other))| other.as_ref())
                .filter(|other| within_range(position, other, range))
                .count();

            if nearby > 0 && self.outcome.relay_succeeds() {
                self.counters.successes += 1;
                report.succeeded += 1;
            } else {
                self.counters.failures += 1;
                report.failed += 1;
            }
            log::trace!("[{}] sweep relay: {} devices nearby", id, nearby);
        }

        report
    }
}
