//! Planar distance helpers.
//!
//! Positions are meters in the operating rectangle. Range checks on hot paths
//! compare squared distances; the square root is only taken when the actual
//! distance is needed (RSSI estimate, coverage statistics).

use super::types::Position;

/// Squared Euclidean distance in meters².
pub fn distance2(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

/// Euclidean distance in meters.
pub fn distance(a: &Position, b: &Position) -> f64 {
    distance2(a, b).sqrt()
}

/// Strict range check, `distance(a, b) < range`.
pub fn within_range(a: &Position, b: &Position, range: f64) -> bool {
    distance2(a, b) < range * range
}
