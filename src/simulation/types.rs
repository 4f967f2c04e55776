//! Type definitions shared across the simulation.
//!
//! Contains:
//! - Node identity and role (`NodeId`, `NodeKind`)
//! - Planar positions in meters
//! - Virtual time (`SimTime`) and spans of virtual time (`SimDuration`)

use std::fmt;
use std::ops::{Add, Sub};

/// Opaque identifier of any simulated node (boat, gateway or collection point).
pub type NodeId = u32;

/// Role of a node in the scenario. Written lowercase in the position log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Boat,
    Gateway,
    Server,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Boat => write!(f, "boat"),
            NodeKind::Gateway => write!(f, "gateway"),
            NodeKind::Server => write!(f, "server"),
        }
    }
}

/// Point in the operating plane, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Virtual timestamp, microseconds since the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

/// Span of virtual time in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimDuration(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    #[cfg(test)]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    #[cfg(test)]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * MICROS_PER_SECOND)
    }

    /// Negative and non-finite inputs saturate to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(secs_to_micros(secs))
    }

    #[cfg(test)]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: SimTime) -> SimDuration {
        SimDuration(self.0.saturating_sub(earlier.0))
    }
}

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration(0);

    #[cfg(test)]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1000)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * MICROS_PER_SECOND)
    }

    /// Negative and non-finite inputs saturate to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self(secs_to_micros(secs))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MICROS_PER_SECOND as f64
    }

    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

fn secs_to_micros(secs: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * MICROS_PER_SECOND as f64).round() as u64
}

impl Add<SimDuration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub<SimDuration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl Add for SimDuration {
    type Output = SimDuration;

    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0.saturating_add(rhs.0))
    }
}

/// Seconds with up to six decimals, trailing zeros trimmed (`5`, `12.5`).
impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0 / MICROS_PER_SECOND;
        let frac = self.0 % MICROS_PER_SECOND;
        if frac == 0 {
            write!(f, "{}", secs)
        } else {
            let digits = format!("{:06}", frac);
            write!(f, "{}.{}", secs, digits.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_time_display_trims_fraction() {
        assert_eq!(SimTime::from_secs(5).to_string(), "5");
        assert_eq!(SimTime::from_secs_f64(30.5).to_string(), "30.5");
        assert_eq!(SimTime::from_micros(1_000_250).to_string(), "1.00025");
    }

    #[test]
    fn sim_time_arithmetic_saturates() {
        let t = SimTime::from_secs(1);
        assert_eq!(t - SimDuration::from_secs(5), SimTime::ZERO);
        assert_eq!(SimTime::ZERO.saturating_since(t), SimDuration::ZERO);
        assert_eq!((t + SimDuration::from_millis(2)).as_micros(), 1_002_000);
    }

    #[test]
    fn negative_seconds_clamp_to_zero() {
        assert_eq!(SimDuration::from_secs_f64(-3.0), SimDuration::ZERO);
        assert_eq!(SimTime::from_secs_f64(f64::NAN), SimTime::ZERO);
    }

    #[test]
    fn node_kind_labels() {
        assert_eq!(NodeKind::Boat.to_string(), "boat");
        assert_eq!(NodeKind::Gateway.to_string(), "gateway");
        assert_eq!(NodeKind::Server.to_string(), "server");
    }
}
