//! `vtctl check`

use anyhow::Result;
use log::info;
use std::path::PathBuf;

use crate::utils::print_header;

/// Validate a VLAN file and print what it defines.
pub fn check_config(path: PathBuf) -> Result<()> {
    let directory = super::load_directory(&path)?;
    info!("{} is valid", path.display());

    let tenants = directory.tenants();
    print_header(&format!(
        "Tenants ({} hosts in {} VLANs)",
        directory.host_count(),
        tenants.len()
    ));
    for (vlan, hosts) in &tenants {
        let hosts: Vec<String> = hosts.iter().map(ToString::to_string).collect();
        println!("vlan {:>4}: {}", vlan, hosts.join(", "));
    }

    let trunks = directory.trunk_switches();
    print_header(&format!("Trunk switches ({})", trunks.len()));
    if trunks.is_empty() {
        println!("none, every switch is access-only");
    }
    for (switch, ports) in &trunks {
        let ports: Vec<String> = ports.iter().map(ToString::to_string).collect();
        println!("switch {}: ports {}", switch, ports.join(", "));
    }

    Ok(())
}
