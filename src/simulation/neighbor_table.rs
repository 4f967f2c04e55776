//! Per-node tables of currently visible neighbors.
//!
//! A table is rebuilt from scratch on every refresh from a position snapshot
//! of all nodes; stale entries are discarded, never aged individually.
//! Ordering is only established when a relay is selected.

use std::collections::HashMap;

use super::geometry::distance;
use super::signal_calculations::{RELAY_TX_POWER_DBM, RssiModel, estimate_rssi};
use super::types::{NodeId, Position, SimTime};

/// One visible neighbor as seen by the owning node.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborRecord {
    pub neighbor_id: NodeId,
    /// Estimated RSSI of the neighbor at the owner (dBm).
    pub rssi: f64,
    pub last_seen: SimTime,
    pub position: Position,
}

/// Unordered neighbor records of a single owner.
pub type NeighborTable = Vec<NeighborRecord>;

/// Owns the neighbor table of every participating node.
#[derive(Debug, Default)]
pub struct NeighborTableManager {
    rssi_model: RssiModel,
    tables: HashMap<NodeId, NeighborTable>,
}

impl NeighborTableManager {
    pub fn new(rssi_model: RssiModel) -> Self {
        Self {
            rssi_model,
            tables: HashMap::new(),
        }
    }

    /// Create an empty table for each participating node.
    pub fn install(&mut self, node_ids: impl IntoIterator<Item = NodeId>) {
        for id in node_ids {
            self.tables.insert(id, NeighborTable::new());
        }
    }

    /// Rebuild `owner`'s table from a snapshot of all node positions.
    ///
    /// Every other node strictly closer than `range_m` is recorded with its
    /// estimated RSSI and `now` as last-seen time. The owner itself is never
    /// recorded, even if it appears in `all_positions`. A table is created
    /// for owners that were not installed.
    ///
    /// # Returns
    ///
    /// The refreshed table. An empty table is a normal outcome.
    pub fn refresh(&mut self, owner: NodeId, owner_position: &Position, all_positions: &[(NodeId, Position)], range_m: f64, now: SimTime) -> &NeighborTable {
        let rssi_model = self.rssi_model;
        let table = self.tables.entry(owner).or_default();
        table.clear();

        for (id, position) in all_positions {
            if *id == owner {
                continue;
            }
            let d = distance(owner_position, position);
            if d < range_m {
                table.push(NeighborRecord {
                    neighbor_id: *id,
                    rssi: estimate_rssi(d, RELAY_TX_POWER_DBM, &rssi_model),
                    last_seen: now,
                    position: *position,
                });
            }
        }

        log::trace!("[{}] neighbor table refreshed: {} within {} m", owner, table.len(), range_m);
        table
    }

    #[cfg(test)]
    pub fn table(&self, owner: NodeId) -> Option<&NeighborTable> {
        self.tables.get(&owner)
    }

    pub fn table_mut(&mut self, owner: NodeId) -> Option<&mut NeighborTable> {
        self.tables.get_mut(&owner)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
