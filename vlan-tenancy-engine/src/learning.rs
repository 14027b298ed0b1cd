//! MAC learning table.
//!
//! One table per switch, mapping a host MAC to the port it was last seen on.
//! Tables for different switches live in different maps, so learning on one
//! switch never waits on another. Entries are never aged out.

use dashmap::DashMap;
use log::trace;

use vlan_tenancy_common::types::{Mac, PortNo, SwitchId};

#[derive(Debug, Default)]
pub struct MacLearningTable {
    switches: DashMap<SwitchId, DashMap<Mac, PortNo>>,
}

impl MacLearningTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `mac` was seen on `port` of `switch`, replacing any
    /// previous entry. Returns the port previously learned, if any.
    pub fn learn(&self, switch: SwitchId, mac: Mac, port: PortNo) -> Option<PortNo> {
        // Fast path: the switch already has a table, only a shard read lock
        // is taken on the outer map.
        let previous = match self.switches.get(&switch) {
            Some(table) => table.insert(mac, port),
            None => self.switches.entry(switch).or_default().insert(mac, port),
        };
        if previous != Some(port) {
            trace!("learned {} on switch {} port {}", mac, switch, port);
        }
        previous
    }

    /// Port on which `mac` was last seen on `switch`.
    pub fn lookup(&self, switch: SwitchId, mac: &Mac) -> Option<PortNo> {
        self.switches
            .get(&switch)
            .and_then(|table| table.get(mac).map(|port| *port))
    }

    /// Snapshot of one switch's table, ordered by MAC.
    pub fn entries(&self, switch: SwitchId) -> Vec<(Mac, PortNo)> {
        let mut entries: Vec<_> = self
            .switches
            .get(&switch)
            .map(|table| table.iter().map(|e| (*e.key(), *e.value())).collect())
            .unwrap_or_default();
        entries.sort();
        entries
    }

    /// Total number of entries over all switches.
    pub fn len(&self) -> usize {
        self.switches.iter().map(|table| table.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
