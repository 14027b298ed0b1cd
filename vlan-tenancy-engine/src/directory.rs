//! VLAN membership directory.
//!
//! Immutable after construction: which tenant VLAN each host belongs to and
//! which ports of each switch are trunks. Missing entries answer `None` or
//! `false`; nothing here fails after the directory has been built.

use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use vlan_tenancy_common::{
    config::VlanConfig,
    types::{Mac, PortNo, SwitchId, VlanId},
    Error, Result,
};

#[derive(Debug, Clone, Default)]
pub struct VlanDirectory {
    hosts: HashMap<Mac, VlanId>,
    trunks: HashMap<SwitchId, BTreeSet<PortNo>>,
}

impl VlanDirectory {
    /// Build a directory from already-typed entries.
    ///
    /// Rejects hosts listed twice, trunk ports that are not physical ports
    /// and trunk ports listed twice for the same switch.
    pub fn new<H, T, P>(hosts: H, trunks: T) -> Result<Self>
    where
        H: IntoIterator<Item = (Mac, VlanId)>,
        T: IntoIterator<Item = (SwitchId, P)>,
        P: IntoIterator<Item = PortNo>,
    {
        let mut host_map = HashMap::new();
        for (mac, vlan) in hosts {
            if host_map.insert(mac, vlan).is_some() {
                return Err(Error::DuplicateHost(mac.to_string()));
            }
        }

        let mut trunk_map: HashMap<SwitchId, BTreeSet<PortNo>> = HashMap::new();
        for (switch, ports) in trunks {
            let set = trunk_map.entry(switch).or_default();
            for port in ports {
                if !port.is_physical() {
                    return Err(Error::InvalidPort {
                        switch: switch.to_string(),
                        port: port.0,
                    });
                }
                if !set.insert(port) {
                    return Err(Error::Config(format!(
                        "trunk port {port} listed twice on switch {switch}"
                    )));
                }
            }
        }

        Ok(Self {
            hosts: host_map,
            trunks: trunk_map,
        })
    }

    /// Tenant VLAN of a host, if it has one.
    pub fn vlan_of(&self, mac: &Mac) -> Option<VlanId> {
        self.hosts.get(mac).copied()
    }

    /// Trunk ports of a switch, in ascending order. Empty for unknown switches.
    pub fn trunk_ports(&self, switch: SwitchId) -> impl Iterator<Item = PortNo> + '_ {
        self.trunks.get(&switch).into_iter().flatten().copied()
    }

    /// A switch with at least one trunk port.
    pub fn is_trunk_capable(&self, switch: SwitchId) -> bool {
        self.trunks.get(&switch).is_some_and(|ports| !ports.is_empty())
    }

    pub fn is_trunk_port(&self, switch: SwitchId, port: PortNo) -> bool {
        self.trunks
            .get(&switch)
            .is_some_and(|ports| ports.contains(&port))
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Hosts grouped per tenant VLAN.
    pub fn tenants(&self) -> BTreeMap<VlanId, Vec<Mac>> {
        let mut tenants: BTreeMap<VlanId, Vec<Mac>> = BTreeMap::new();
        for (mac, vlan) in &self.hosts {
            tenants.entry(*vlan).or_default().push(*mac);
        }
        for hosts in tenants.values_mut() {
            hosts.sort();
        }
        tenants
    }

    /// Trunk-capable switches with their trunk ports.
    pub fn trunk_switches(&self) -> BTreeMap<SwitchId, Vec<PortNo>> {
        self.trunks
            .iter()
            .filter(|(_, ports)| !ports.is_empty())
            .map(|(switch, ports)| (*switch, ports.iter().copied().collect()))
            .collect()
    }
}

impl TryFrom<VlanConfig> for VlanDirectory {
    type Error = Error;

    fn try_from(config: VlanConfig) -> Result<Self> {
        let hosts = config
            .hosts
            .iter()
            .map(|(mac, vlan)| Ok((mac.parse::<Mac>()?, VlanId::new(*vlan)?)))
            .collect::<Result<Vec<_>>>()?;

        let trunks = config
            .trunks
            .iter()
            .map(|(switch, ports)| {
                let ports = ports.iter().copied().map(PortNo).collect::<Vec<_>>();
                Ok((switch.parse::<SwitchId>()?, ports))
            })
            .collect::<Result<Vec<_>>>()?;

        let directory = VlanDirectory::new(hosts, trunks)?;
        debug!(
            "VLAN directory ready: {} hosts, {} trunk switches",
            directory.host_count(),
            directory.trunk_switches().len()
        );
        Ok(directory)
    }
}
