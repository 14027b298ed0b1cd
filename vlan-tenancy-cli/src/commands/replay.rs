//! `vtctl replay`: run a recorded packet-in trace through the controller.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use vlan_tenancy_common::{
    command::{Command, PacketIn},
    config::SessionConfig,
    types::SwitchId,
};
use vlan_tenancy_engine::{Controller, Engine, MacLearningTable};
use vlan_tenancy_session::{ChannelGateway, SessionHub};

use crate::utils::Timer;

/// One step of a trace.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEntry {
    Connect(SwitchId),
    PacketIn(PacketIn),
}

fn read_trace(path: &Path) -> Result<Vec<TraceEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse trace {}", path.display()))
}

pub async fn replay_trace(config: PathBuf, trace: PathBuf, pretty: bool) -> Result<()> {
    let directory = super::load_directory(&config)?;
    let entries = read_trace(&trace)?;
    info!("Replaying {} trace entries from {}", entries.len(), trace.display());

    // A packet-in yields at most two commands and a connect one, so a queue
    // of this size never drops.
    let session_config = SessionConfig {
        outbound_queue: SessionConfig::default()
            .outbound_queue
            .max(2 * entries.len()),
        ..SessionConfig::default()
    };

    let engine = Engine::new(Arc::new(directory), Arc::new(MacLearningTable::new()));
    let (gateway, mut outbound) = ChannelGateway::channel(session_config.outbound_queue);
    let controller = Arc::new(Controller::new(engine, Arc::new(gateway)));
    let metrics = Arc::clone(controller.metrics());

    let collector = tokio::spawn(async move {
        let mut commands = Vec::new();
        while let Some(command) = outbound.recv().await {
            commands.push(command);
        }
        commands
    });

    let timer = Timer::new("trace replay");
    let hub = SessionHub::new(controller, session_config);
    for (index, entry) in entries.into_iter().enumerate() {
        match entry {
            TraceEntry::Connect(switch) => hub.connect(switch).await,
            TraceEntry::PacketIn(event) => {
                debug!("entry {}: packet-in from switch {}", index, event.switch_id);
                hub.deliver(event)
                    .await
                    .with_context(|| format!("trace entry {index}"))?;
            }
        }
    }
    hub.shutdown().await;
    // Dropping the hub releases the last gateway sender and ends the collector.
    drop(hub);
    let elapsed = timer.elapsed();
    drop(timer);

    let mut commands = collector.await.context("command collector failed")?;
    commands.sort_by_key(Command::switch_id);
    write_commands(&commands, pretty)?;

    let snapshot = metrics.snapshot();
    eprintln!(
        "replayed in {}: {}",
        crate::utils::format_duration(elapsed),
        serde_json::to_string_pretty(&snapshot)?
    );
    Ok(())
}

fn write_commands(commands: &[Command], pretty: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for command in commands {
        let line = if pretty {
            serde_json::to_string_pretty(command)?
        } else {
            serde_json::to_string(command)?
        };
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}
