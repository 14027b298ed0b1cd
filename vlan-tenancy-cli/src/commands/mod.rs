pub mod check;
pub mod replay;
pub mod table_miss;

use anyhow::{Context, Result};
use std::path::Path;
use vlan_tenancy_common::config::VlanConfig;
use vlan_tenancy_engine::VlanDirectory;

/// Load a VLAN file and validate it into a directory.
pub fn load_directory(path: &Path) -> Result<VlanDirectory> {
    let config = VlanConfig::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    VlanDirectory::try_from(config)
        .with_context(|| format!("invalid VLAN configuration in {}", path.display()))
}
