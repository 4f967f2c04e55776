//! Periodic coverage sampling: how far each field device is from its
//! nearest gateway, and how many devices a gateway can hear.

use std::io::{self, Write};

use super::geometry::distance;
use super::types::{NodeId, Position, SimDuration, SimTime};

/// Maximum distance (m) at which a gateway is assumed to hear a device.
pub const DEFAULT_MAX_RANGE_M: f64 = 15_000.0;

/// Sampling period of the coverage log.
pub const DEFAULT_SAMPLE_INTERVAL: SimDuration = SimDuration::from_secs(5);

/// Column header of the coverage log.
pub const COVERAGE_CSV_HEADER: &str = "time,total_boats,boats_in_range,coverage_percent,avg_distance,min_distance,max_distance";

/// One coverage row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageSample {
    pub time: SimTime,
    pub total_devices: u32,
    pub devices_in_range: u32,
    pub coverage_percent: f64,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
}

impl CoverageSample {
    pub fn write_csv_row<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(
            w,
            "{},{},{},{},{},{},{}",
            self.time, self.total_devices, self.devices_in_range, self.coverage_percent, self.avg_distance, self.min_distance, self.max_distance
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoverageSampler {
    max_range_m: f64,
}

impl CoverageSampler {
    pub fn new(max_range_m: f64) -> Self {
        Self { max_range_m }
    }

    /// Compute one coverage sample.
    ///
    /// # Parameters
    ///
    /// * `time` - Sampling instant
    /// * `devices` - Every field device, `None` where the position is unknown
    /// * `gateways` - Known gateway positions
    ///
    /// # Returns
    ///
    /// The sample. Devices without a position are skipped for this tick but
    /// still count toward `total_devices`. A device with no gateway at all
    /// gets twice the maximum range as its distance. Percent and average are
    /// zero when there are no devices; min and max are zero when no device
    /// was sampled.
    pub fn sample(&self, time: SimTime, devices: &[(NodeId, Option<Position>)], gateways: &[Position]) -> CoverageSample {
        let total_devices = devices.len() as u32;
        let no_gateway_distance = self.max_range_m * 2.0;

        let mut in_range = 0u32;
        let mut sum = 0.0;
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;

        for (_, position) in devices {
            let Some(position) = position else {
                continue;
            };
            let nearest = gateways.iter().map(|gw| distance(position, gw)).fold(no_gateway_distance, f64::min);

            sum += nearest;
            min = Some(min.map_or(nearest, |m| m.min(nearest)));
            max = Some(max.map_or(nearest, |m| m.max(nearest)));
            if nearest <= self.max_range_m {
                in_range += 1;
            }
        }

        let (coverage_percent, avg_distance) = if total_devices > 0 {
            (in_range as f64 / total_devices as f64 * 100.0, sum / total_devices as f64)
        } else {
            (0.0, 0.0)
        };

        CoverageSample {
            time,
            total_devices,
            devices_in_range: in_range,
            coverage_percent,
            avg_distance,
            min_distance: min.unwrap_or(0.0),
            max_distance: max.unwrap_or(0.0),
        }
    }
}

impl Default for CoverageSampler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RANGE_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(points: &[(f64, f64)]) -> Vec<(NodeId, Option<Position>)> {
        points.iter().enumerate().map(|(i, (x, y))| (i as NodeId, Some(Position::new(*x, *y)))).collect()
    }

    #[test]
    fn no_devices_no_division_fault() {
        let s = CoverageSampler::default().sample(SimTime::ZERO, &[], &[Position::new(0.0, 0.0)]);
        assert_eq!(s.total_devices, 0);
        assert_eq!(s.coverage_percent, 0.0);
        assert_eq!(s.avg_distance, 0.0);
        assert!(s.coverage_percent.is_finite() && s.avg_distance.is_finite());
    }

    #[test]
    fn all_in_range_is_full_coverage() {
        let gws = [Position::new(0.0, 0.0), Position::new(20_000.0, 0.0)];
        let devs = devices(&[(100.0, 0.0), (19_000.0, 0.0), (5_000.0, 0.0), (10_000.0, 0.0)]);
        let s = CoverageSampler::default().sample(SimTime::from_secs(5), &devs, &gws);
        assert_eq!(s.devices_in_range, 4);
        assert_eq!(s.coverage_percent, 100.0);
        assert_eq!(s.min_distance, 100.0);
        assert_eq!(s.max_distance, 10_000.0);
        assert!(s.min_distance <= s.avg_distance && s.avg_distance <= s.max_distance);
        assert_eq!(s.avg_distance, (100.0 + 1000.0 + 5000.0 + 10_000.0) / 4.0);
    }

    #[test]
    fn range_boundary_is_inclusive() {
        let gws = [Position::new(0.0, 0.0)];
        let devs = devices(&[(15_000.0, 0.0), (15_001.0, 0.0)]);
        let s = CoverageSampler::default().sample(SimTime::ZERO, &devs, &gws);
        assert_eq!(s.devices_in_range, 1);
        assert_eq!(s.coverage_percent, 50.0);
    }

    #[test]
    fn missing_positions_still_count_in_total() {
        let gws = [Position::new(0.0, 0.0)];
        let mut devs = devices(&[(3_000.0, 4_000.0)]);
        devs.push((1, None));
        let s = CoverageSampler::default().sample(SimTime::ZERO, &devs, &gws);
        assert_eq!(s.total_devices, 2);
        assert_eq!(s.devices_in_range, 1);
        assert_eq!(s.avg_distance, 2_500.0);
        assert_eq!(s.min_distance, 5_000.0);
    }

    #[test]
    fn no_gateways_means_out_of_range() {
        let devs = devices(&[(0.0, 0.0)]);
        let s = CoverageSampler::default().sample(SimTime::ZERO, &devs, &[]);
        assert_eq!(s.devices_in_range, 0);
        assert_eq!(s.min_distance, 30_000.0);
    }

    #[test]
    fn csv_row_matches_header_columns() {
        let s = CoverageSample {
            time: SimTime::from_secs(10),
            total_devices: 4,
            devices_in_range: 3,
            coverage_percent: 75.0,
            avg_distance: 1234.5,
            min_distance: 10.0,
            max_distance: 4000.0,
        };
        let mut out = Vec::new();
        s.write_csv_row(&mut out).unwrap();
        let line = String::from_utf8(out).unwrap();
        assert_eq!(line, "10,4,3,75,1234.5,10,4000\n");
        assert_eq!(line.trim_end().split(',').count(), COVERAGE_CSV_HEADER.split(',').count());
    }
}
