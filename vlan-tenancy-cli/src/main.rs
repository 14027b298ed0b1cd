use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vlan_tenancy_common::types::SwitchId;

mod commands;
mod utils;

/// VLAN tenancy controller tooling
#[derive(Parser)]
#[clap(name = "vtctl", author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a VLAN configuration file and summarize it
    Check {
        /// Path to the VLAN configuration (JSON, YAML or TOML)
        config: PathBuf,
    },

    /// Replay a packet-in trace through the controller
    Replay {
        /// Path to the VLAN configuration
        #[clap(short, long)]
        config: PathBuf,

        /// JSON trace of connect and packet_in entries
        trace: PathBuf,

        /// Pretty-print emitted commands
        #[clap(long)]
        pretty: bool,
    },

    /// Print the table-miss rule installed on a switch
    TableMiss {
        /// Datapath id, decimal or 0x-prefixed hex
        dpid: SwitchId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" }
    )).init();

    match cli.command {
        Commands::Check { config } => {
            commands::check::check_config(config)?;
        }
        Commands::Replay { config, trace, pretty } => {
            commands::replay::replay_trace(config, trace, pretty).await?;
        }
        Commands::TableMiss { dpid } => {
            commands::table_miss::print_table_miss(dpid)?;
        }
    }

    Ok(())
}
