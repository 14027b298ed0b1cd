//! `vtctl table-miss`

use anyhow::Result;
use vlan_tenancy_common::{
    command::{Command, FlowMod},
    types::SwitchId,
};

pub fn print_table_miss(switch: SwitchId) -> Result<()> {
    let command = Command::FlowMod(FlowMod::table_miss(switch));
    println!("{}", serde_json::to_string(&command)?);
    Ok(())
}
