//! Reference scenario: boats and gateways on a random walk, periodic uplinks
//! and the measurement handlers, all driven from one virtual-time queue.
//!
//! Radio reception is reduced to a range check against the nearest gateway.
//! A heard uplink reaches the collection point after its time-on-air plus a
//! fixed backhaul delay. An uplink no gateway hears is lost; with peer relay
//! enabled it triggers a relay attempt instead.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Uniform};
use std::io::Write;

use super::context::SimulationContext;
use super::coverage::{COVERAGE_CSV_HEADER, CoverageSampler};
use super::geometry::distance;
use super::latency::PacketId;
use super::mobility::Fleet;
use super::scheduler::{Scheduler, Ticker};
use super::signal_calculations::calculate_air_time;
use super::types::{NodeId, NodeKind, Position, SimDuration, SimTime};
use crate::common::config::ScenarioConfig;
use crate::common::csv_log::{CsvLog, FileLog, OutputError};

/// Column header of the position log.
pub const POSITIONS_CSV_HEADER: &str = "time,node_id,x,y,type";

/// Interval of the position log.
pub const POSITION_LOG_INTERVAL: SimDuration = SimDuration::from_secs(5);

const TRAFFIC_STREAM: u64 = 0x5eed_0003;

/// Handlers the scheduler can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    PositionLog,
    CoverageTick,
    Uplink { device: NodeId },
    Deliver { packet_id: PacketId, bytes: usize },
    RelaySweep,
    Beacon { device: NodeId },
}

pub struct Scenario<'a, W: Write> {
    config: &'a ScenarioConfig,
    fleet: Fleet,
    mobility_rng: StdRng,
    scheduler: Scheduler<Event>,
    sampler: CoverageSampler,
    position_ticker: Ticker,
    coverage_ticker: Ticker,
    uplink_ticker: Ticker,
    sweep_ticker: Ticker,
    beacon_ticker: Ticker,
    positions: CsvLog<W>,
    coverage: CsvLog<W>,
}

impl<'a, W: Write> Scenario<'a, W> {
    /// Place every node and schedule the first occurrence of each handler.
    ///
    /// Boats get ids `0..devices`, gateways follow, the collection point is
    /// the last id and stays at the origin. The sinks must already carry
    /// their headers.
    pub fn new(config: &'a ScenarioConfig, ctx: &mut SimulationContext, positions: CsvLog<W>, coverage: CsvLog<W>) -> Self {
        let mut mobility_rng = StdRng::seed_from_u64(config.seed);
        let mut traffic_rng = StdRng::seed_from_u64(config.seed ^ TRAFFIC_STREAM);

        let mut fleet = Fleet::new(config.area_width_m, config.area_height_m, SimDuration::from_secs_f64(config.walk_step_s));
        for id in 0..config.devices {
            fleet.add_random(id, NodeKind::Boat, config.device_speed_mps, &mut mobility_rng);
        }
        for id in config.devices..config.devices + config.gateways {
            fleet.add_random(id, NodeKind::Gateway, config.gateway_speed_mps, &mut mobility_rng);
        }
        let server_id = config.devices + config.gateways;
        fleet.add_at(server_id, NodeKind::Server, Position::new(0.0, 0.0), 0.0, &mut mobility_rng);

        let mut scheduler = Scheduler::new(SimTime::from_secs_f64(config.sim_time_s));
        scheduler.schedule_at(SimTime::ZERO, Event::PositionLog);
        scheduler.schedule_at(SimTime::ZERO, Event::CoverageTick);

        let stagger = Uniform::new(0.0, config.send_interval_s);
        for device in 0..config.devices {
            let first = SimTime::from_secs_f64(stagger.sample(&mut traffic_rng));
            scheduler.schedule_at(first, Event::Uplink { device });
        }

        if config.enable_p2p {
            ctx.relay.install(0..config.devices);
            scheduler.schedule_at(SimTime::from_secs_f64(config.relay.sweep_interval_s), Event::RelaySweep);
            for device in 0..config.devices {
                let first = config.relay.beacon_offset_s + device as f64 * config.relay.beacon_stagger_s;
                scheduler.schedule_at(SimTime::from_secs_f64(first), Event::Beacon { device });
            }
        }

        Self {
            config,
            fleet,
            mobility_rng,
            scheduler,
            sampler: CoverageSampler::new(config.coverage.max_range_m),
            position_ticker: Ticker::new(POSITION_LOG_INTERVAL),
            coverage_ticker: Ticker::new(SimDuration::from_secs_f64(config.coverage.interval_s)),
            uplink_ticker: Ticker::new(SimDuration::from_secs_f64(config.send_interval_s)),
            sweep_ticker: Ticker::new(SimDuration::from_secs_f64(config.relay.sweep_interval_s)),
            beacon_ticker: Ticker::new(SimDuration::from_secs_f64(config.relay.beacon_interval_s)),
            positions,
            coverage,
        }
    }

    /// Dispatch events until the queue is empty, then flush the sinks.
    pub fn run(&mut self, ctx: &mut SimulationContext) -> Result<(), OutputError> {
        log::info!(
            "Running {} boats, {} gateways for {} s (peer relay {})",
            self.config.devices,
            self.config.gateways,
            self.config.sim_time_s,
            if self.config.enable_p2p { "enabled" } else { "disabled" }
        );

        while let Some((now, event)) = self.scheduler.next_event() {
            self.fleet.advance_to(now, &mut self.mobility_rng);
            match event {
                Event::PositionLog => self.on_position_log(now)?,
                Event::CoverageTick => self.on_coverage_tick(ctx, now)?,
                Event::Uplink { device } => self.on_uplink(ctx, device, now),
                Event::Deliver { packet_id, bytes } => on_deliver(ctx, packet_id, bytes, now),
                Event::RelaySweep => self.on_relay_sweep(ctx),
                Event::Beacon { device } => self.on_beacon(ctx, device, now),
            }
        }

        self.positions.flush()?;
        self.coverage.flush()?;
        log::info!(
            "Run finished: {} position rows, {} coverage rows, {} sends never delivered",
            self.positions.rows(),
            self.coverage.rows(),
            ctx.latency.pending_len()
        );
        Ok(())
    }

    fn device_positions(&self) -> Vec<(NodeId, Position)> {
        self.fleet.snapshot_of(NodeKind::Boat)
    }

    fn on_position_log(&mut self, now: SimTime) -> Result<(), OutputError> {
        for node in self.fleet.nodes() {
            let p = node.position();
            self.positions.write_with(|w| writeln!(w, "{},{},{},{},{}", now, node.node_id, p.x, p.y, node.kind))?;
        }
        self.scheduler.reschedule(&self.position_ticker, Event::PositionLog);
        Ok(())
    }

    fn on_coverage_tick(&mut self, ctx: &mut SimulationContext, now: SimTime) -> Result<(), OutputError> {
        let devices: Vec<(NodeId, Option<Position>)> = self.device_positions().into_iter().map(|(id, p)| (id, Some(p))).collect();
        let gateways: Vec<Position> = self.fleet.snapshot_of(NodeKind::Gateway).into_iter().map(|(_, p)| p).collect();
        let sample = self.sampler.sample(now, &devices, &gateways);
        self.coverage.write_with(|w| sample.write_csv_row(w))?;
        log::debug!("[{}] coverage {:.1}% ({}/{})", now, sample.coverage_percent, sample.devices_in_range, sample.total_devices);

        if let Some(horizon_s) = self.config.latency.pending_horizon_s {
            let evicted = ctx.latency.evict_older_than(now, SimDuration::from_secs_f64(horizon_s));
            if evicted > 0 {
                log::debug!("[{}] evicted {} pending sends", now, evicted);
            }
        }

        self.scheduler.reschedule(&self.coverage_ticker, Event::CoverageTick);
        Ok(())
    }

    fn on_uplink(&mut self, ctx: &mut SimulationContext, device: NodeId, now: SimTime) {
        let config = self.config;
        let packet_id = ctx.next_packet_id();
        ctx.packets_sent += 1;
        ctx.latency.on_send(packet_id, now);
        ctx.energy.energy_for_transmission(config.spreading_factor, config.tx_power_dbm, config.payload_bytes);

        let position = self.fleet.position_of(device);
        let nearest_gateway = position.and_then(|p| {
            self.fleet
                .snapshot_of(NodeKind::Gateway)
                .iter()
                .map(|(_, gw)| distance(&p, gw))
                .min_by(f64::total_cmp)
        });

        match nearest_gateway {
            Some(d) if d <= config.coverage.max_range_m => {
                let air_time = SimDuration::from_secs_f64(calculate_air_time(config.spreading_factor, config.payload_bytes));
                let backhaul = SimDuration::from_secs_f64(config.backhaul_delay_ms / 1000.0);
                self.scheduler.schedule_in(
                    air_time + backhaul,
                    Event::Deliver {
                        packet_id,
                        bytes: config.payload_bytes,
                    },
                );
                log::trace!("[{}] boat {} packet {} heard at {:.0} m", now, device, packet_id, d);
            }
            _ => {
                log::debug!("[{}] boat {} packet {} not heard by any gateway", now, device, packet_id);
                if config.enable_p2p {
                    let others = self.fleet.snapshot();
                    ctx.relay.on_transmission_failed(device, position.as_ref(), &others, now);
                }
            }
        }

        self.scheduler.reschedule(&self.uplink_ticker, Event::Uplink { device });
    }

    fn on_relay_sweep(&mut self, ctx: &mut SimulationContext) {
        let devices: Vec<(NodeId, Option<Position>)> = self.device_positions().into_iter().map(|(id, p)| (id, Some(p))).collect();
        let report = ctx.relay.run_sweep(&devices);
        log::debug!(
            "[{}] relay sweep: {} selected, {} succeeded, {} failed",
            self.scheduler.now(),
            report.selected,
            report.succeeded,
            report.failed
        );
        self.scheduler.reschedule(&self.sweep_ticker, Event::RelaySweep);
    }

    fn on_beacon(&mut self, ctx: &mut SimulationContext, device: NodeId, now: SimTime) {
        if let Some(position) = self.fleet.position_of(device) {
            let others = self.fleet.snapshot();
            let neighbors = ctx.relay.refresh_proactive(device, &position, &others, now);
            log::trace!("[{}] boat {} beacon: {} neighbors", now, device, neighbors);
        }
        self.scheduler.reschedule(&self.beacon_ticker, Event::Beacon { device });
    }

    #[cfg(test)]
    pub fn into_sinks(self) -> (CsvLog<W>, CsvLog<W>) {
        (self.positions, self.coverage)
    }
}

fn on_deliver(ctx: &mut SimulationContext, packet_id: PacketId, bytes: usize, now: SimTime) {
    ctx.throughput.record(bytes, now);
    match ctx.latency.on_receive(packet_id, now) {
        Some(latency_ms) => log::trace!("[{}] packet {} delivered after {:.2} ms", now, packet_id, latency_ms),
        None => log::debug!("[{}] packet {} delivered without a pending send", now, packet_id),
    }
}

/// Open the position and coverage logs of `config` with their headers.
pub fn open_sinks(config: &ScenarioConfig) -> Result<(FileLog, FileLog), OutputError> {
    let positions = CsvLog::create(&config.positions_path(), POSITIONS_CSV_HEADER)?;
    let coverage = CsvLog::create(&config.coverage_path(), COVERAGE_CSV_HEADER)?;
    Ok((positions, coverage))
}
