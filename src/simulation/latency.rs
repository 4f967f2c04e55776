//! Send/receive correlation into end-to-end latency samples.
//!
//! Every uplink leaves a pending entry keyed by its packet id. When the
//! collection point reports the packet, the entry is consumed and the delay
//! becomes a latency sample. Receptions without a pending entry are normal
//! (lost correlation, reused id) and only counted.

use std::collections::HashMap;

use super::stats::SampleStats;
use super::types::{SimDuration, SimTime};

/// Identifier of an outbound packet, unique per run.
pub type PacketId = u64;

#[derive(Debug, Default)]
pub struct LatencyCorrelator {
    pending: HashMap<PacketId, SimTime>,
    samples_ms: Vec<f64>,
    unmatched: u64,
    evicted: u64,
}

impl LatencyCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a send. A reused id overwrites the earlier send time.
    pub fn on_send(&mut self, packet_id: PacketId, time: SimTime) {
        self.pending.insert(packet_id, time);
    }

    /// Close the correlation for `packet_id`.
    ///
    /// # Returns
    ///
    /// The latency in milliseconds, or `None` when no send is pending for this
    /// id. A matched id is removed, so a second reception is unmatched.
    pub fn on_receive(&mut self, packet_id: PacketId, time: SimTime) -> Option<f64> {
        match self.pending.remove(&packet_id) {
            Some(sent) => {
                let latency_ms = time.saturating_since(sent).as_millis_f64();
                self.samples_ms.push(latency_ms);
                Some(latency_ms)
            }
            None => {
                self.unmatched += 1;
                None
            }
        }
    }

    /// Drop pending sends older than `horizon` at `now`. Returns how many were dropped.
    pub fn evict_older_than(&mut self, now: SimTime, horizon: SimDuration) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, sent| now.saturating_since(*sent) <= horizon);
        let dropped = before - self.pending.len();
        self.evicted += dropped as u64;
        dropped
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    #[cfg(test)]
    pub fn samples(&self) -> &[f64] {
        &self.samples_ms
    }

    pub fn unmatched(&self) -> u64 {
        self.unmatched
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn stats(&self) -> Option<SampleStats> {
        SampleStats::from_samples(&self.samples_ms)
    }
}
