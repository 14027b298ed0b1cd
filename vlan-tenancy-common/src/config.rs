//! Static VLAN configuration.
//!
//! The file lists which tenant VLAN every host belongs to and which ports of
//! each switch are trunks:
//!
//! ```json
//! {
//!   "hosts":  { "00:00:00:00:00:01": 10, "00:00:00:00:00:02": 20 },
//!   "trunks": { "1": [1], "3": [1, 2] }
//! }
//! ```
//!
//! JSON, YAML and TOML are accepted; the format follows the file extension.
//! Values are kept as written here and validated when the directory is built.
//!
//! Environment variables named `VLAN_TENANCY_<SECTION>__<KEY>` are layered
//! on top of the file. Trunk ports may be given as a comma-separated list:
//!
//! ```text
//! VLAN_TENANCY_TRUNKS__7=1,2
//! ```

use config::{Config, Environment, File};
use log::debug;
use serde::de::{self, Deserializer, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::Error;

/// Prefix of environment variables overlaying the file.
pub const ENV_PREFIX: &str = "VLAN_TENANCY";

/// Raw VLAN configuration as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanConfig {
    /// Host MAC address -> tenant VLAN id.
    #[serde(default)]
    pub hosts: BTreeMap<String, u16>,
    /// Switch (datapath) id -> trunk port numbers.
    #[serde(default, deserialize_with = "trunk_map")]
    pub trunks: BTreeMap<String, Vec<u32>>,
}

impl VlanConfig {
    /// Load a configuration file, with `VLAN_TENANCY_*` environment
    /// variables layered on top.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let cfg: VlanConfig = settings.try_deserialize()?;
        debug!(
            "loaded {} hosts and {} trunk switches from {}",
            cfg.hosts.len(),
            cfg.trunks.len(),
            path.display()
        );
        Ok(cfg)
    }
}

/// Ports of one trunk switch: a list, a single port, or a comma-separated
/// string as environment variables carry them.
struct PortList(Vec<u32>);

impl<'de> Deserialize<'de> for PortList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PortListVisitor)
    }
}

struct PortListVisitor;

impl<'de> Visitor<'de> for PortListVisitor {
    type Value = PortList;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of port numbers")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PortList, E> {
        u32::try_from(v)
            .map(|port| PortList(vec![port]))
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PortList, E> {
        u32::try_from(v)
            .map(|port| PortList(vec![port]))
            .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PortList, E> {
        v.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|_| E::invalid_value(Unexpected::Str(p), &self))
            })
            .collect::<Result<Vec<_>, E>>()
            .map(PortList)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PortList, A::Error> {
        let mut ports = Vec::new();
        while let Some(port) = seq.next_element::<u32>()? {
            ports.push(port);
        }
        Ok(PortList(ports))
    }
}

fn trunk_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, PortList>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(switch, ports)| (switch, ports.0)).collect())
}

/// Session-layer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of the queue of commands heading to switches.
    pub outbound_queue: usize,
    /// Capacity of each switch's queue of pending packet-in events.
    pub inbound_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_queue: 1024,
            inbound_queue: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(ext: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_json() {
        let file = write_config(
            "json",
            r#"{"hosts": {"00:00:00:00:00:01": 10}, "trunks": {"1": [1, 2]}}"#,
        );
        let cfg = VlanConfig::load(file.path()).unwrap();
        assert_eq!(cfg.hosts.get("00:00:00:00:00:01"), Some(&10));
        assert_eq!(cfg.trunks.get("1"), Some(&vec![1, 2]));
    }

    #[test]
    fn test_load_yaml_without_trunks() {
        let file = write_config("yaml", "hosts:\n  \"00:00:00:00:00:0a\": 30\n");
        let cfg = VlanConfig::load(file.path()).unwrap();
        assert_eq!(cfg.hosts.len(), 1);
        assert!(!cfg.trunks.contains_key("1"));
    }

    #[test]
    fn test_env_overlays_trunks() {
        // Switch ids unique to this test; the environment is process-wide.
        std::env::set_var("VLAN_TENANCY_TRUNKS__71", "3");
        std::env::set_var("VLAN_TENANCY_TRUNKS__72", "1, 2");
        let file = write_config(
            "json",
            r#"{"hosts": {"00:00:00:00:00:01": 10}, "trunks": {"1": [1]}}"#,
        );
        let loaded = VlanConfig::load(file.path());
        std::env::remove_var("VLAN_TENANCY_TRUNKS__71");
        std::env::remove_var("VLAN_TENANCY_TRUNKS__72");

        let cfg = loaded.unwrap();
        assert_eq!(cfg.trunks.get("1"), Some(&vec![1]));
        assert_eq!(cfg.trunks.get("71"), Some(&vec![3]));
        assert_eq!(cfg.trunks.get("72"), Some(&vec![1, 2]));
    }

    #[test]
    fn test_trunk_ports_reject_garbage() {
        let file = write_config("json", r#"{"trunks": {"1": "1,x"}}"#);
        assert!(VlanConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = VlanConfig::load("/nonexistent/vlans.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
